//! Fixed user-facing strings written into chat messages by the dispatch jobs.
//!
//! These are also stripped back out of the history before it is sent to an
//! executor, so a model never sees the system's own apologies as prior turns.

/// Text a freshly created bot message carries until a job replaces it.
pub const PLACEHOLDER: &str = "* ...thinking... *";

pub const DEFAULT_ERROR: &str = "[Sorry, something is broken, please try again later!]";
pub const NO_EXECUTOR: &str =
    "[Sorry, There're no machine to process this LLM right now! Please report to Admin or retry later!]";
pub const EMPTY_RESPONSE: &str =
    "[Oops, the LLM returned empty message, please try again later or report to admins!]";
pub const BRAND_ADVISORY: &str =
    "[Regarding the introduction of Kuwa, please refer to the information on the official kuwaai.org website.]";
pub const BRAND_ADVISORY_ZH: &str = "[有關Kuwa的相關說明，請以 kuwaai.org 官網的資訊為準。]";

/// Every string the system itself may have injected into a message.
pub const INJECTED: [&str; 5] = [
    DEFAULT_ERROR,
    NO_EXECUTOR,
    EMPTY_RESPONSE,
    BRAND_ADVISORY,
    BRAND_ADVISORY_ZH,
];

/// Advisory line for the given locale (`zh_tw`, `zh-TW`, `en_us`, ...).
pub fn brand_advisory(locale: &str) -> &'static str {
    let locale = locale.to_ascii_lowercase();
    if locale.starts_with("zh") {
        BRAND_ADVISORY_ZH
    } else {
        BRAND_ADVISORY
    }
}
