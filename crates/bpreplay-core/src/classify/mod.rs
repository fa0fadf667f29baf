//! Command classifier - maps raw command bytes to named device operations.
//!
//! Classification is a pure function of the write payload and, for
//! exchanges, the reassembled reply. It never touches the trace or the
//! output; the session decides what to emit from the [`Classification`].

pub mod pattern;
pub mod rules;

pub use pattern::{Pattern, PatternMismatch};
pub use rules::{Action, Arg, CommandRule, EXCHANGE_RULES, WRITE_RULES};

/// Result of running a payload through a rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<'r> {
    /// A rule matched and every check held.
    Matched {
        rule: &'r CommandRule,
        args: Vec<Arg>,
    },
    /// A rule recognised the command family but hands it to generic emission.
    Delegated {
        rule: &'r CommandRule,
        note: &'static str,
    },
    /// A rule was selected but one of its strict checks failed.
    Mismatch {
        rule: &'r CommandRule,
        fault: PatternMismatch,
    },
    NoMatch,
}

impl Classification<'_> {
    /// The selected rule, if any.
    pub fn rule(&self) -> Option<&CommandRule> {
        match self {
            Classification::Matched { rule, .. }
            | Classification::Delegated { rule, .. }
            | Classification::Mismatch { rule, .. } => Some(rule),
            Classification::NoMatch => None,
        }
    }
}

impl PartialEq for CommandRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.selector == other.selector
            && self.assertion == other.assertion
            && self.reply == other.reply
    }
}

impl Eq for CommandRule {}

/// First-match classification over `rules`.
///
/// Rules with a reply expectation are skipped when there is no reply.
pub fn classify<'r>(
    rules: &'r [CommandRule],
    write: &[u8],
    reply: Option<&[u8]>,
) -> Classification<'r> {
    for rule in rules {
        if !rule.selector.matches(write) {
            continue;
        }
        if let Some(assertion) = &rule.assertion {
            if let Err(fault) = assertion.check(write) {
                return Classification::Mismatch { rule, fault };
            }
        }
        match (&rule.reply, reply) {
            (Some(expected), Some(actual)) => {
                if let Err(fault) = expected.check(actual) {
                    return Classification::Mismatch { rule, fault };
                }
            }
            (Some(_), None) => continue,
            (None, _) => {}
        }
        return match rule.action {
            Action::Delegate(note) => Classification::Delegated { rule, note },
            Action::Call | Action::CallBindReply => Classification::Matched {
                rule,
                args: (rule.args)(write, reply.unwrap_or_default()),
            },
        };
    }
    Classification::NoMatch
}

/// Classify a write answered by `reply`.
pub fn classify_exchange<'a>(write: &[u8], reply: &[u8]) -> Classification<'a> {
    classify(EXCHANGE_RULES, write, Some(reply))
}

/// Classify a write with no reply.
pub fn classify_write<'a>(write: &[u8]) -> Classification<'a> {
    classify(WRITE_RULES, write, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched_name(c: &Classification<'_>) -> Option<&'static str> {
        match c {
            Classification::Matched { rule, .. } => Some(rule.name),
            _ => None,
        }
    }

    #[test]
    fn test_led_mask_write() {
        let c = classify_write(&[0x0C, 0x07, 0x30]);
        assert_eq!(matched_name(&c), Some("led_mask"));
        match c {
            Classification::Matched { args, .. } => assert_eq!(args, vec![Arg::Name("all")]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_led_mask_write_bad_suffix() {
        match classify_write(&[0x0C, 0x07, 0x31]) {
            Classification::Mismatch { rule, fault } => {
                assert_eq!(rule.name, "led_mask");
                assert_eq!(
                    fault,
                    PatternMismatch::Byte {
                        offset: 2,
                        expected: 0x30,
                        actual: 0x31
                    }
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_all_ff_reply() {
        let write = [0x45, 0x01, 0x00, 0x00, 0x31, 0x00, 0x06];
        let c = classify_exchange(&write, &[0xFF; 100]);
        assert_eq!(matched_name(&c), Some("cmd_45"));
        match c {
            Classification::Matched { args, .. } => assert!(args.is_empty()),
            _ => unreachable!(),
        }

        let mut short = vec![0xFF; 99];
        assert!(matches!(
            classify_exchange(&write, &short),
            Classification::Mismatch {
                fault: PatternMismatch::Length {
                    expected: 100,
                    actual: 99
                },
                ..
            }
        ));
        short.push(0xFE);
        assert!(matches!(
            classify_exchange(&write, &short),
            Classification::Mismatch {
                fault: PatternMismatch::Byte { offset: 99, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_priority_exact_before_catch_all() {
        let c = classify_exchange(&[0x22, 0x02, 0x10, 0x00, 0x1F, 0x00, 0x06], &[0x00]);
        assert_eq!(matched_name(&c), Some("sm_insert"));

        let c = classify_exchange(&[0x22, 0x02, 0x30, 0x00, 0x31, 0x00, 0x06], &[0x00]);
        assert!(matches!(
            c,
            Classification::Delegated {
                note: "Unexpected (SM?) read",
                ..
            }
        ));
        assert!(c.rule().unwrap().read_only);
    }

    #[test]
    fn test_check_cont_before_generic_57() {
        let c = classify_exchange(&[0x57, 0x85, 0x00], &[0x01]);
        assert_eq!(matched_name(&c), Some("check_cont"));

        let c = classify_exchange(&[0x57, 0x01, 0x00, 0x57, 0x02, 0x00], &[0x01, 0x02]);
        assert_eq!(matched_name(&c), Some("cmd_57s"));

        let c = classify_exchange(&[0x57, 0x01, 0x00, 0x58, 0x02, 0x00], &[0x01]);
        assert!(matches!(c, Classification::Mismatch { .. }));
    }

    #[test]
    fn test_unknown_is_no_match() {
        assert_eq!(classify_exchange(&[0x99, 0x01], &[0x00]), Classification::NoMatch);
        assert_eq!(classify_write(&[0x99, 0x01]), Classification::NoMatch);
        assert_eq!(classify_write(&[]), Classification::NoMatch);
    }

    #[test]
    fn test_deterministic() {
        let inputs: &[(&[u8], &[u8])] = &[
            (&[0x01], &[0x12, 0x34]),
            (&[0x10, 0x80, 0x02], &[0x80, 0x00, 0x00, 0x00, 0x09, 0x00]),
            (&[0x10, 0x80, 0x02], &[0x80]),
            (&[0x22, 0x09], &[]),
            (&[0x77], &[0x00]),
        ];
        for (write, reply) in inputs {
            let a = classify_exchange(write, reply);
            for _ in 0..3 {
                assert_eq!(classify_exchange(write, reply), a);
            }
        }
    }

    #[test]
    fn test_write_rules_with_args() {
        match classify_write(&[0x57, 0x12, 0x00, 0x50, 0x34, 0x00, 0x00]) {
            Classification::Matched { rule, args } => {
                assert_eq!(rule.name, "cmd_57_50");
                assert_eq!(args, vec![Arg::Bytes(vec![0x12]), Arg::Bytes(vec![0x34])]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        match classify_write(&[0x50, 0x9F, 0x09, 0x00, 0x00]) {
            Classification::Matched { rule, args } => {
                assert_eq!(rule.name, "cmd_50");
                assert_eq!(args, vec![Arg::Bytes(vec![0x9F, 0x09])]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            classify_write(&[0x50, 0x9F, 0x09, 0x01, 0x00]),
            Classification::Mismatch { .. }
        ));
    }
}
