/// Opening marker wrapped around content from unverified sources
pub const UNTRUSTED_BEGIN: &str = "<untrusted-data>";

/// Closing marker for unverified content
pub const UNTRUSTED_END: &str = "</untrusted-data>";

/// Whether the text carries the untrusted-content marker
///
/// The gateway scans every message and tool result of a request with this
/// check; a single hit gates tool policies for the whole conversation.
pub fn contains_untrusted_marker(text: &str) -> bool {
    text.contains(UNTRUSTED_BEGIN)
}

/// Wrap external content in the untrusted markers
pub fn wrap_untrusted(content: &str) -> String {
    format!("{UNTRUSTED_BEGIN}\n{content}\n{UNTRUSTED_END}")
}
