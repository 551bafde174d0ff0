//! Outbound notification boundary.
//!
//! The chat front end lives outside this crate; the engines only ever talk
//! to it through [`Notifier`].

use crate::utils::errors::Result;
use async_trait::async_trait;

/// Opaque handle identifying the interaction a reply belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionHandle(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `text` to `destination`.
    async fn notify(&self, destination: &str, text: &str) -> Result<()>;

    /// Reply to a command interaction.
    async fn respond(&self, interaction: &InteractionHandle, text: &str, ephemeral: bool) -> Result<()>;

    /// Post `text` with a file attached.
    async fn attach_file(
        &self,
        destination: &str,
        text: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<()>;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Everything a notifier was asked to deliver, in call order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Notify { destination: String, text: String },
        Respond { interaction: String, text: String, ephemeral: bool },
        Attach { destination: String, text: String, filename: String, len: usize },
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .map(|s| match s {
                    Sent::Notify { text, .. } | Sent::Respond { text, .. } | Sent::Attach { text, .. } => text,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, destination: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Notify {
                destination: destination.to_string(),
                text: text.to_string(),
            });
            Ok(())
        }

        async fn respond(&self, interaction: &InteractionHandle, text: &str, ephemeral: bool) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Respond {
                interaction: interaction.0.clone(),
                text: text.to_string(),
                ephemeral,
            });
            Ok(())
        }

        async fn attach_file(
            &self,
            destination: &str,
            text: &str,
            bytes: Vec<u8>,
            filename: &str,
        ) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Attach {
                destination: destination.to_string(),
                text: text.to_string(),
                filename: filename.to_string(),
                len: bytes.len(),
            });
            Ok(())
        }
    }
}
