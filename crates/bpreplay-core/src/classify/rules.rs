//! Ordered command rule tables.
//!
//! Order matters: the first rule whose selector matches wins, so the tables
//! are kept in the order the generated scripts have always relied on. Do not
//! reorder entries to "tidy" them.

use super::pattern::Pattern;
use crate::protocol::constants::led_name;

/// A call argument pulled out of a matched transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Byte payload; rendered as a literal or blob reference.
    Bytes(Vec<u8>),
    /// Quoted symbolic name.
    Name(&'static str),
    /// Single byte rendered as `0xNN`.
    Byte(u8),
}

/// What a matched rule emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `cmd.<name>(dev, args...)`
    Call,
    /// The call followed by `buff = <reply>`.
    CallBindReply,
    /// Known family but not understood: annotate and use the generic exchange.
    Delegate(&'static str),
}

/// Argument extractor over `(write, reply)`.
pub type ArgExtractor = fn(&[u8], &[u8]) -> Vec<Arg>;

/// One entry of a rule table.
#[derive(Debug, Clone, Copy)]
pub struct CommandRule {
    pub name: &'static str,
    /// Loose match deciding whether the rule applies.
    pub selector: Pattern,
    /// Strict check on the write once selected.
    pub assertion: Option<Pattern>,
    /// Strict check on the reassembled reply.
    pub reply: Option<Pattern>,
    /// Status/info query that never changes device state.
    pub read_only: bool,
    pub action: Action,
    pub args: ArgExtractor,
}

impl CommandRule {
    const fn call(name: &'static str, selector: Pattern) -> Self {
        Self {
            name,
            selector,
            assertion: None,
            reply: None,
            read_only: false,
            action: Action::Call,
            args: no_args,
        }
    }

    const fn read_only(self) -> Self {
        Self {
            read_only: true,
            ..self
        }
    }

    const fn assert(self, assertion: Pattern) -> Self {
        Self {
            assertion: Some(assertion),
            ..self
        }
    }

    const fn expect_reply(self, reply: Pattern) -> Self {
        Self {
            reply: Some(reply),
            ..self
        }
    }

    const fn bind_reply(self) -> Self {
        Self {
            action: Action::CallBindReply,
            ..self
        }
    }

    const fn delegate(self, note: &'static str) -> Self {
        Self {
            action: Action::Delegate(note),
            ..self
        }
    }

    const fn with_args(self, args: ArgExtractor) -> Self {
        Self { args, ..self }
    }

    /// Render `cmd.<name>(dev, ...)` from already rendered arguments.
    pub fn call_line(&self, args: &[String]) -> String {
        let mut line = format!("cmd.{}(dev", self.name);
        for arg in args {
            line.push_str(", ");
            line.push_str(arg);
        }
        line.push(')');
        line
    }
}

fn no_args(_write: &[u8], _reply: &[u8]) -> Vec<Arg> {
    Vec::new()
}

fn reply_arg(_write: &[u8], reply: &[u8]) -> Vec<Arg> {
    vec![Arg::Bytes(reply.to_vec())]
}

fn led_arg(write: &[u8], _reply: &[u8]) -> Vec<Arg> {
    write
        .get(1)
        .map(|&mask| match led_name(mask) {
            Some(name) => vec![Arg::Name(name)],
            None => vec![Arg::Byte(mask)],
        })
        .unwrap_or_default()
}

fn selectors_and_reply(write: &[u8], reply: &[u8]) -> Vec<Arg> {
    let selectors = write.chunks(3).filter_map(|g| g.get(1).copied()).collect();
    vec![Arg::Bytes(selectors), Arg::Bytes(reply.to_vec())]
}

fn byte_at<const N: usize>(write: &[u8]) -> Arg {
    Arg::Bytes(write.get(N).map(|&b| vec![b]).unwrap_or_default())
}

fn cmd_43_args(write: &[u8], _reply: &[u8]) -> Vec<Arg> {
    vec![byte_at::<2>(write)]
}

fn cmd_57_50_args(write: &[u8], _reply: &[u8]) -> Vec<Arg> {
    vec![byte_at::<1>(write), byte_at::<4>(write)]
}

fn cmd_50_args(write: &[u8], _reply: &[u8]) -> Vec<Arg> {
    vec![Arg::Bytes(write.get(1..3).map(<[u8]>::to_vec).unwrap_or_default())]
}

const LED_MASK: Pattern = Pattern::Masked {
    bytes: &[0x0C, 0x00, 0x30],
    mask: &[0xFF, 0x00, 0xFF],
};

const ALL_FF_100: [u8; 100] = [0xFF; 100];

/// Commands answered by one or more bulk reads.
pub static EXCHANGE_RULES: &[CommandRule] = &[
    CommandRule::call("cmd_01", Pattern::Exact(&[0x01]))
        .read_only()
        .bind_reply(),
    CommandRule::call("cmd_02", Pattern::Exact(&[0x02])).with_args(reply_arg),
    CommandRule::call("gpio_readi", Pattern::Exact(&[0x03])).read_only(),
    CommandRule::call(
        "led_mask",
        Pattern::Lead {
            byte: 0x0C,
            len: None,
        },
    )
    .assert(LED_MASK)
    .with_args(led_arg),
    CommandRule::call("sn_read", Pattern::Exact(&[0x0E, 0x00])).read_only(),
    CommandRule::call("sm_info3", Pattern::Exact(&[0x0E, 0x02])).read_only(),
    CommandRule::call("cmd_10", Pattern::Exact(&[0x10, 0x80, 0x02]))
        .expect_reply(Pattern::Exact(&[0x80, 0x00, 0x00, 0x00, 0x09, 0x00])),
    // 0x22 looks like offset + count reads of socket module info.
    CommandRule::call(
        "sm_info10",
        Pattern::Exact(&[0x22, 0x02, 0x10, 0x00, 0x13, 0x00, 0x06]),
    )
    .read_only(),
    CommandRule::call(
        "sm_insert",
        Pattern::Exact(&[0x22, 0x02, 0x10, 0x00, 0x1F, 0x00, 0x06]),
    )
    .read_only(),
    CommandRule::call(
        "sm_info22",
        Pattern::Exact(&[0x22, 0x02, 0x22, 0x00, 0x23, 0x00, 0x06]),
    )
    .read_only(),
    CommandRule::call(
        "sm_info24",
        Pattern::Exact(&[0x22, 0x02, 0x24, 0x00, 0x25, 0x00, 0x06]),
    )
    .read_only(),
    CommandRule::call(
        "sm_read",
        Pattern::Lead {
            byte: 0x22,
            len: None,
        },
    )
    .read_only()
    .delegate("Unexpected (SM?) read"),
    CommandRule::call(
        "cmd_45",
        Pattern::Exact(&[0x45, 0x01, 0x00, 0x00, 0x31, 0x00, 0x06]),
    )
    .expect_reply(Pattern::Exact(&ALL_FF_100)),
    // Possibly read-only as well; kept as a state change until confirmed.
    CommandRule::call("cmd_49", Pattern::Exact(&[0x49])).expect_reply(Pattern::Exact(&[0x0F, 0x00])),
    CommandRule::call("cmd_4A", Pattern::Exact(&[0x4A, 0x03, 0x00, 0x00, 0x00]))
        .expect_reply(Pattern::Exact(&[0x03, 0x00])),
    CommandRule::call("check_cont", Pattern::Exact(&[0x57, 0x85, 0x00])),
    CommandRule::call(
        "cmd_57s",
        Pattern::Bracketed {
            first: 0x57,
            last: 0x00,
            lens: &[3, 6],
        },
    )
    .assert(Pattern::Groups {
        bytes: &[0x57, 0x00, 0x00],
        mask: &[0xFF, 0x00, 0xFF],
        counts: &[1, 2],
    })
    .with_args(selectors_and_reply),
];

/// Commands written without a reply.
pub static WRITE_RULES: &[CommandRule] = &[
    CommandRule::call("cmd_09", Pattern::Exact(&[0x09, 0x10, 0x57, 0x81, 0x00])),
    CommandRule::call(
        "led_mask",
        Pattern::Lead {
            byte: 0x0C,
            len: Some(3),
        },
    )
    .assert(LED_MASK)
    .with_args(led_arg),
    CommandRule::call(
        "led_mask",
        Pattern::Lead {
            byte: 0x0C,
            len: Some(2),
        },
    )
    .with_args(led_arg),
    CommandRule::call("cmd_20", Pattern::Exact(&[0x20, 0x01, 0x00])),
    CommandRule::call(
        "cmd_3B",
        Pattern::Exact(&[
            0x3B, 0x0C, 0x22, 0x00, 0xC0, 0x40, 0x00, 0x3B, 0x0E, 0x22, 0x00, 0xC0, 0x00, 0x00,
            0x3B, 0x1A, 0x22, 0x00, 0xC0, 0x18, 0x00,
        ]),
    ),
    CommandRule::call("cmd_41", Pattern::Exact(&[0x41, 0x00, 0x00])),
    CommandRule::call("cmd_43", Pattern::Exact(&[0x43, 0x19, 0x10, 0x00, 0x00]))
        .with_args(cmd_43_args),
    CommandRule::call("cmd_4C", Pattern::Exact(&[0x4C, 0x00, 0x02])),
    CommandRule::call(
        "cmd_57_50",
        Pattern::Lead {
            byte: 0x57,
            len: Some(7),
        },
    )
    .assert(Pattern::Masked {
        bytes: &[0x57, 0x00, 0x00, 0x50, 0x00, 0x00, 0x00],
        mask: &[0xFF, 0x00, 0xFF, 0xFF, 0x00, 0xFF, 0xFF],
    })
    .with_args(cmd_57_50_args),
    // ex: 50 9F 09 00 00
    CommandRule::call(
        "cmd_50",
        Pattern::Lead {
            byte: 0x50,
            len: None,
        },
    )
    .assert(Pattern::Masked {
        bytes: &[0x50, 0x00, 0x00, 0x00, 0x00],
        mask: &[0xFF, 0x00, 0x00, 0xFF, 0xFF],
    })
    .with_args(cmd_50_args),
];
