//! TwiML rendering for synchronous webhook replies

/// Content type Twilio expects for a TwiML document
pub const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Escape text for inclusion in an XML text node
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// A TwiML response carrying exactly one reply message
pub fn message_response(text: &str) -> String {
    format!(
        "<Response><Message>{}</Message></Response>",
        escape_xml(text)
    )
}
