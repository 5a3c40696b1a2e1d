//! Embedded HTML email templates
//!
//! Placeholders use `{Token}` syntax and are substituted by the caller with
//! [`render`] before dispatch.

pub const PROSPECT_OUTREACH: &str = "ProspectOutreach";
pub const PARTNER_WELCOME: &str = "PartnerWelcome";

const PROSPECT_OUTREACH_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #1f2933;">
  <div style="max-width: 600px; margin: 0 auto;">
    {personalizedContent}
    <hr style="border: none; border-top: 1px solid #e4e7eb;" />
    <p style="font-size: 12px; color: #7b8794;">
      You are receiving this note because {CommunityName} appears to be a great fit for community cleanups.
      Reply to let us know if you'd prefer not to hear from us again.
    </p>
  </div>
</body>
</html>"#;

const PARTNER_WELCOME_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #1f2933;">
  <div style="max-width: 600px; margin: 0 auto;">
    <p>Hi {UserName},</p>
    <p>Welcome aboard! {CommunityName} is now an official community partner.</p>
    {personalizedContent}
    <p>Thank you for helping volunteers keep our communities clean.</p>
  </div>
</body>
</html>"#;

/// Raw template HTML by key
pub fn html_template(key: &str) -> Option<&'static str> {
    match key {
        PROSPECT_OUTREACH => Some(PROSPECT_OUTREACH_HTML),
        PARTNER_WELCOME => Some(PARTNER_WELCOME_HTML),
        _ => None,
    }
}

/// Replace every `{Token}` occurrence with its value in a single pass
///
/// Unknown tokens are left untouched. Substituted values are never scanned
/// for further tokens. Values are inserted verbatim, so plain text must go
/// through [`escape_html`] first.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut html = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        html.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let token = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == token)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                html.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                html.push('{');
                rest = after;
            }
        }
    }

    html.push_str(rest);
    html
}

/// Escape text for inclusion in HTML element content or attribute values
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
