//! Fixed text substitutions applied to remote files.

/// Replace every occurrence of `old` with `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRule {
    pub old: &'static str,
    pub new: &'static str,
}

/// Points the app at the renamed transaction route.
pub const ENDPOINT_RULE: PatchRule = PatchRule {
    old: "/transaction",
    new: "/submit-transaction",
};

impl PatchRule {
    /// The patched text, or `None` when applying the rule changes nothing.
    pub fn apply(&self, text: &str) -> Option<String> {
        if !text.contains(self.old) {
            return None;
        }
        let patched = text.replace(self.old, self.new);
        (patched != text).then_some(patched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_every_occurrence() {
        let src = "fetch('/transaction'); post('/transaction/new')";
        assert_eq!(
            ENDPOINT_RULE.apply(src).as_deref(),
            Some("fetch('/submit-transaction'); post('/submit-transaction/new')")
        );
    }

    #[test]
    fn test_text_without_occurrence_is_untouched() {
        assert_eq!(ENDPOINT_RULE.apply("@app.route('/submit')"), None);
    }

    #[test]
    fn test_patched_text_is_stable() {
        let once = ENDPOINT_RULE.apply("@app.route('/transaction')").unwrap();
        assert_eq!(once, "@app.route('/submit-transaction')");
        assert_eq!(ENDPOINT_RULE.apply(&once), None);
    }

    #[test]
    fn test_identity_rule_reports_no_change() {
        let rule = PatchRule { old: "a", new: "a" };
        assert_eq!(rule.apply("banana"), None);
    }
}
