//! Flow codes: compact declarations of input→output reachability.
//!
//! A flow code assigns each port a class character; an input reaches an
//! output when their classes agree. The router consults flow codes when it
//! propagates notifier signals across elements and when it validates that
//! expected producer/consumer pairings exist — the code describes where a
//! packet entering an input may leave, not what the element does to it.

use smallvec::SmallVec;

/// A parsed flow code.
///
/// Written `"I/O"` with one class character per port, where the final
/// character extends to any further ports. Classes are letters, matched
/// case-sensitively, or `#`, which matches only the same-numbered port on
/// the other side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowCode {
    inputs: SmallVec<[u8; 8]>,
    outputs: SmallVec<[u8; 8]>,
}

impl FlowCode {
    /// Every input reaches every output.
    pub const COMPLETE: &'static str = "x/x";
    /// No input reaches any output.
    pub const NONE: &'static str = "x/y";
    /// Each input reaches only the same-numbered output.
    pub const STRAIGHT: &'static str = "#/#";

    /// Parses a flow code specification.
    ///
    /// Specifications are static class descriptors; malformed ones are
    /// programmer errors and panic.
    pub fn parse(spec: &str) -> FlowCode {
        let (inputs, outputs) = spec
            .split_once('/')
            .unwrap_or_else(|| panic!("bad flow code specification {:?}", spec));
        FlowCode {
            inputs: parse_side(inputs, spec),
            outputs: parse_side(outputs, spec),
        }
    }

    /// True when a packet entering `input` may leave through `output`.
    pub fn reachable(&self, input: usize, output: usize) -> bool {
        let ci = class_at(&self.inputs, input);
        let co = class_at(&self.outputs, output);
        if ci == b'#' || co == b'#' {
            ci == co && input == output
        } else {
            ci == co
        }
    }
}

fn parse_side(side: &str, spec: &str) -> SmallVec<[u8; 8]> {
    let side = side.trim();
    let mut classes = SmallVec::new();
    for ch in side.bytes() {
        if ch.is_ascii_alphabetic() || ch == b'#' {
            classes.push(ch);
        } else {
            panic!("bad flow code specification {:?}", spec);
        }
    }
    if classes.is_empty() {
        panic!("bad flow code specification {:?}", spec);
    }
    classes
}

fn class_at(classes: &[u8], port: usize) -> u8 {
    classes
        .get(port)
        .or_else(|| classes.last())
        .copied()
        .unwrap_or(b'x')
}
