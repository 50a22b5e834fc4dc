//! The trace rewrite pipeline.
//!
//! A fuzzer trace is turned into Solidity statements by a fixed sequence of
//! text passes. Every pass sees the whole output of the previous one, and is
//! the identity on text its pattern does not match.

use std::{borrow::Cow, fmt};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

lazy_static! {
    /// `*wait* ` marks calls the fuzzer flagged as not changing state.
    pub static ref MARKER_STRIP: Pass = Pass::new("marker strip", r"\*wait\* ", "");

    /// `foo(1) Time delay: 10 seconds` -> `Time delay: 10 seconds` + `    foo(1)`
    pub static ref ANNOTATION_REORDER: Pass = Pass::new(
        "annotation reorder",
        r"(?m)^([ \t]*)([A-Za-z_][A-Za-z0-9_.]*\(.*\)) (Time delay: [^\n]*)$",
        "${1}${3}\n${1}    ${2}",
    );

    /// The delay is in seconds; units and `Block delay` are dropped.
    pub static ref DELAY_MATERIALIZE: Pass = Pass::new(
        "delay materialize",
        r"(?m)^([ \t]*)Time delay: (\d+) [^\n]*$",
        "${1}vm.warp(block.timestamp + ${2});",
    );

    pub static ref STATEMENT_TERMINATE: Pass = Pass::new("statement terminate", r"(?m)\)([ \t]*\r?)$", ");${1}");

    pub static ref ADDRESS_TYPING: Pass = Pass::new("address typing", r"\b0x([0-9a-fA-F]+),", "address(0x${1}),");

    /// Statements sit two levels deep: contract, then test function. Lines
    /// already indented 8 or more are continuation lines and keep their depth.
    pub static ref INDENT_RENORMALIZE: Pass = Pass::new("indent renormalize", r"(?m)^[ \t]{0,7}(\S)", "        ${1}");
}

/// A single rewrite pass: every match of `pattern` is replaced by `replacement`.
#[derive(Debug)]
pub struct Pass {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl Pass {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            replacement,
        }
    }

    /// Apply the pass. Text outside the pattern's domain is returned as is.
    pub fn apply(&self, text: &str) -> String {
        let rewritten = match self.pattern.replace_all(text, self.replacement) {
            Cow::Borrowed(_) => {
                debug!("[{}] no match, text unchanged", self.name);
                return text.to_string();
            }
            Cow::Owned(rewritten) => rewritten,
        };

        for m in self.pattern.find_iter(text) {
            debug!("[{}] rewrite: {:?}", self.name, m.as_str());
        }
        let rewritten_lines = self.matched_lines(text);
        let total = text.lines().count();
        info!(
            "[{}] {} lines rewritten, {} lines passed through",
            self.name,
            rewritten_lines,
            total.saturating_sub(rewritten_lines)
        );
        debug!("[{}] output:\n{}", self.name, rewritten);

        rewritten
    }

    /// Number of distinct lines holding at least one match.
    pub fn matched_lines(&self, text: &str) -> usize {
        let mut count = 0;
        let mut last_line = None;
        for m in self.pattern.find_iter(text) {
            let line = text[..m.start()].matches('\n').count();
            if last_line != Some(line) {
                count += 1;
                last_line = Some(line);
            }
        }
        count
    }
}

/// The passes in the order they run. Each one relies on the shape the
/// previous ones leave behind.
pub fn pipeline() -> [&'static Pass; 6] {
    [
        &*MARKER_STRIP,
        &*ANNOTATION_REORDER,
        &*DELAY_MATERIALIZE,
        &*STATEMENT_TERMINATE,
        &*ADDRESS_TYPING,
        &*INDENT_RENORMALIZE,
    ]
}

/// The Solidity statements produced from a trace, one per line at body depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementBlock(String);

impl StatementBlock {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StatementBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run the whole pipeline over a raw trace.
pub fn transform(trace: &str) -> StatementBlock {
    let text = pipeline().iter().fold(trace.to_string(), |text, pass| pass.apply(&text));
    StatementBlock(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_strip() {
        assert_eq!(MARKER_STRIP.apply("*wait* foo(1)\n"), "foo(1)\n");
        assert_eq!(
            MARKER_STRIP.apply("    *wait* Time delay: 5 seconds\nbar() *wait* baz()\n"),
            "    Time delay: 5 seconds\nbar() baz()\n"
        );
        // only the marker followed by a space
        assert_eq!(MARKER_STRIP.apply("*wait*\n"), "*wait*\n");
    }

    #[test]
    fn test_annotation_reorder() {
        assert_eq!(
            ANNOTATION_REORDER.apply("foo(0xAB12,) Time delay: 10 seconds\n"),
            "Time delay: 10 seconds\n    foo(0xAB12,)\n"
        );
        assert_eq!(
            ANNOTATION_REORDER.apply("    Market.buy(1,2) Time delay: 7 seconds Block delay: 3\n    sell(4)\n"),
            "    Time delay: 7 seconds Block delay: 3\n        Market.buy(1,2)\n    sell(4)\n"
        );
        // last line without a trailing newline
        assert_eq!(
            ANNOTATION_REORDER.apply("bar(3) Time delay: 1 seconds"),
            "Time delay: 1 seconds\n    bar(3)"
        );
    }

    #[test]
    fn test_annotation_reorder_no_match() {
        let text = "Time delay: 10 seconds\nfoo(1)\nCall sequence:\n";
        assert_eq!(ANNOTATION_REORDER.apply(text), text);
    }

    #[test]
    fn test_delay_materialize() {
        assert_eq!(
            DELAY_MATERIALIZE.apply("Time delay: 10 seconds\n    foo(1)\n"),
            "vm.warp(block.timestamp + 10);\n    foo(1)\n"
        );
        assert_eq!(
            DELAY_MATERIALIZE.apply("    Time delay: 360 seconds Block delay: 12\n"),
            "    vm.warp(block.timestamp + 360);\n"
        );
    }

    #[test]
    fn test_statement_terminate() {
        assert_eq!(STATEMENT_TERMINATE.apply("foo(bar(1),2)\n"), "foo(bar(1),2);\n");
        assert_eq!(STATEMENT_TERMINATE.apply("foo(1)\r\nbar()"), "foo(1);\r\nbar();");
        // already terminated lines are left alone
        let text = "vm.warp(block.timestamp + 10);\n    foo(1);\n";
        assert_eq!(STATEMENT_TERMINATE.apply(text), text);
        // trailing blanks after the call
        assert_eq!(STATEMENT_TERMINATE.apply("    foo(1)   \n"), "    foo(1);   \n");
        assert_eq!(STATEMENT_TERMINATE.apply("bar()\t\r\n"), "bar();\t\r\n");
        assert_eq!(transform("    foo(1)   \n").as_str(), "        foo(1);   \n");
    }

    #[test]
    fn test_address_typing() {
        assert_eq!(
            ADDRESS_TYPING.apply("    foo(0xAB12,);\n"),
            "    foo(address(0xAB12),);\n"
        );
        assert_eq!(
            ADDRESS_TYPING.apply("swap(0x00000000000000000000000000000000000f0000,0xdeadBEEF,42);\n"),
            "swap(address(0x00000000000000000000000000000000000f0000),address(0xdeadBEEF),42);\n"
        );
        // the last argument has no comma and is not rewritten
        assert_eq!(ADDRESS_TYPING.apply("approve(0xAB12);\n"), "approve(0xAB12);\n");
    }

    #[test]
    fn test_indent_renormalize() {
        assert_eq!(
            INDENT_RENORMALIZE.apply("vm.warp(block.timestamp + 1);\n    foo();\n\n"),
            "        vm.warp(block.timestamp + 1);\n        foo();\n\n"
        );
        let text = "        foo();\n";
        assert_eq!(INDENT_RENORMALIZE.apply(text), text);
        assert_eq!(INDENT_RENORMALIZE.apply("\tfoo();\n"), "        foo();\n");
    }

    #[test]
    fn test_indent_keeps_continuation_lines() {
        assert_eq!(
            transform("    foo(bar(1,\n            2))\n").as_str(),
            "        foo(bar(1,\n            2));\n"
        );
    }

    #[test]
    fn test_matched_lines() {
        let text = "swap(0x1,0x2,3);\nfoo(0x3,4);\nbar(5);\n";
        assert_eq!(ADDRESS_TYPING.matched_lines(text), 2);
        assert_eq!(MARKER_STRIP.matched_lines("*wait* *wait* foo()\nbar()\n"), 1);
        assert_eq!(STATEMENT_TERMINATE.matched_lines("foo();\n"), 0);
    }

    #[test]
    fn test_transform_wait_call_with_delay() {
        let trace = "*wait* foo(0xAB12,) Time delay: 10 seconds\n";

        let stages: Vec<String> = pipeline()
            .iter()
            .scan(trace.to_string(), |text, pass| {
                *text = pass.apply(text);
                Some(text.clone())
            })
            .collect();
        assert_eq!(stages[0], "foo(0xAB12,) Time delay: 10 seconds\n");
        assert_eq!(stages[1], "Time delay: 10 seconds\n    foo(0xAB12,)\n");
        assert_eq!(stages[2], "vm.warp(block.timestamp + 10);\n    foo(0xAB12,)\n");
        assert_eq!(stages[3], "vm.warp(block.timestamp + 10);\n    foo(0xAB12,);\n");
        assert_eq!(stages[4], "vm.warp(block.timestamp + 10);\n    foo(address(0xAB12),);\n");
        assert_eq!(
            stages[5],
            "        vm.warp(block.timestamp + 10);\n        foo(address(0xAB12),);\n"
        );

        assert_eq!(transform(trace).as_str(), stages[5]);
    }

    #[test]
    fn test_transform_sequence() {
        let trace = "    deposit(100)\n    *wait* Time delay: 86400 seconds Block delay: 7200\n    \
                     transfer(0x10000,5) Time delay: 3 seconds Block delay: 1\n    withdraw(0x20000,0x30000,1)\n";
        let expected = "        deposit(100);\n        vm.warp(block.timestamp + 86400);\n        \
                        vm.warp(block.timestamp + 3);\n        transfer(address(0x10000),5);\n        \
                        withdraw(address(0x20000),address(0x30000),1);\n";
        assert_eq!(transform(trace).as_str(), expected);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let traces = [
            "*wait* foo(0xAB12,) Time delay: 10 seconds\n",
            "    deposit(100)\n    *wait* Time delay: 5 seconds Block delay: 1\n    withdraw(0xBEEF,1)\n",
            "Call sequence:\n\nfoo()\r\nbar(0x1,2) Time delay: 2 seconds",
            "    foo(1)   \n",
            "",
        ];
        for trace in traces {
            let once = transform(trace);
            let twice = transform(once.as_str());
            assert_eq!(once, twice, "trace: {trace:?}");
        }
    }

    #[test]
    fn test_transform_empty() {
        let block = transform("");
        assert!(block.is_empty());
        assert_eq!(block.as_str(), "");
    }

    #[test]
    fn test_unmatched_lines_pass_through() {
        assert_eq!(transform("Call sequence:\n").as_str(), "        Call sequence:\n");
        assert_eq!(transform("\n\n").as_str(), "\n\n");
    }
}
