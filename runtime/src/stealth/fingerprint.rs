//! Browser fingerprint patching: hide automation signals.
//!
//! Trackers that spot an automated browser discard its traffic, which
//! defeats the point of cover traffic. The patch runs before any page script.

/// Template for the init script. `__LANGUAGES__` is replaced with a JSON array.
const STEALTH_TEMPLATE: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true,
    });

    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: function() {},
            sendMessage: function() {},
        };
    }

    if (navigator.permissions && navigator.permissions.query) {
        const originalQuery = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = (parameters) =>
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery(parameters);
    }

    Object.defineProperty(navigator, 'plugins', {
        get: () => [1, 2, 3, 4, 5],
        configurable: true,
    });

    Object.defineProperty(navigator, 'languages', {
        get: () => __LANGUAGES__,
        configurable: true,
    });
})();
"#;

/// Build the init script advertising the given languages.
pub fn stealth_script(languages: &[String]) -> String {
    let languages = if languages.is_empty() {
        serde_json::json!(["en-US", "en"])
    } else {
        serde_json::json!(languages)
    };
    STEALTH_TEMPLATE.replace("__LANGUAGES__", &languages.to_string())
}
