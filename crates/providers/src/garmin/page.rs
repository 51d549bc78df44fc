//! Artifacts scraped from Garmin SSO pages.
//!
//! All HTML pattern matching for the sign-in flow lives here so markup
//! changes only touch this module.

use std::sync::LazyLock;

use regex::Regex;

static CSRF_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)name="_csrf"\s+value="(.+?)""#).unwrap());
static TICKET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)ticket=([^"]+)""#).unwrap());
static ACCOUNT_STATUS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)var status\s*=\s*"([^"]*)""#).unwrap());
static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>([^<]*)</title>").unwrap());

const PHONE_UPDATE_TITLE: &str = "Update Phone Number";

fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// CSRF token embedded in the sign-in form.
pub fn extract_csrf(html: &str) -> Option<&str> {
    capture_group_1(&CSRF_REGEX, html)
}

/// Service ticket issued after a successful credential post.
pub fn extract_ticket(html: &str) -> Option<&str> {
    capture_group_1(&TICKET_REGEX, html)
}

/// Account status marker (`var status = "..."`), present when sign-in is blocked.
pub fn extract_account_status(html: &str) -> Option<&str> {
    capture_group_1(&ACCOUNT_STATUS_REGEX, html)
}

pub fn extract_title(html: &str) -> Option<&str> {
    capture_group_1(&TITLE_REGEX, html)
}

/// Outcome of inspecting the credential post response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPageVerdict<'a> {
    /// Sign-in is blocked; carries the status text (may be empty).
    Locked(&'a str),
    /// The account must confirm a phone number in a browser first.
    PhoneVerificationRequired,
    Ticket(&'a str),
    /// No ticket and no known blocker, usually a second factor.
    NoTicket,
}

/// Classify the credential post response.
///
/// Blockers are checked before the ticket so a locked page is never mined
/// for a ticket.
pub fn inspect_login_response(html: &str) -> LoginPageVerdict<'_> {
    if let Some(status) = extract_account_status(html) {
        return LoginPageVerdict::Locked(status);
    }

    if extract_title(html).is_some_and(|title| title.contains(PHONE_UPDATE_TITLE)) {
        return LoginPageVerdict::PhoneVerificationRequired;
    }

    match extract_ticket(html) {
        Some(ticket) => LoginPageVerdict::Ticket(ticket),
        None => LoginPageVerdict::NoTicket,
    }
}
