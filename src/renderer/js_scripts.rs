//! JavaScript evaluation scripts
//!
//! Scripts the renderer evaluates inside the page. Pattern lists come from
//! the term dictionary and are spliced in as JSON literals.

/// Reports document readiness and DOM size so the caller can wait for the
/// node count to stop changing.
pub const READINESS_SCRIPT: &str = r#"
    (() => ({
        ready: document.readyState === 'complete',
        nodes: document.getElementsByTagName('*').length
    }))()
"#;

/// Clicks at most two visible elements whose label matches a consent pattern.
/// Takes the pattern list; returns the number of clicks.
const CONSENT_CLICK_FN: &str = r#"
    (patterns) => {
        const candidates = document.querySelectorAll(
            'button, [role="button"], a, input[type="button"], input[type="submit"]'
        );
        let clicked = 0;
        for (const el of candidates) {
            const label = (el.innerText || el.value || el.getAttribute('aria-label') || '')
                .trim()
                .toLowerCase();
            if (!label || label.length > 40) continue;
            const rect = el.getBoundingClientRect();
            if (rect.width === 0 || rect.height === 0) continue;
            if (patterns.some(p => label === p || label.startsWith(p + ' '))) {
                try { el.click(); clicked++; } catch (e) {}
                if (clicked >= 2) break;
            }
        }
        return clicked;
    }
"#;

/// Clicks the `index`-th element that looks like a collapsed menu toggle.
/// Takes the pattern list and the index; returns whether something was clicked.
const MENU_TOGGLE_FN: &str = r#"
    (patterns, index) => {
        const selector = [
            '[aria-expanded="false"]',
            '[aria-haspopup="true"]',
            'button[aria-label]',
            'summary',
            '.hamburger',
            '.menu-toggle',
            '.navbar-toggler',
            '[class*="menu-button"]',
            '[class*="nav-toggle"]'
        ].join(', ');
        const toggles = [];
        for (const el of document.querySelectorAll(selector)) {
            const label = [
                el.innerText || '',
                el.getAttribute('aria-label') || '',
                el.getAttribute('class') || ''
            ].join(' ').toLowerCase();
            const structural = el.matches(
                '[aria-expanded="false"], summary, .hamburger, .menu-toggle, .navbar-toggler'
            );
            if (structural || patterns.some(p => label.includes(p))) {
                toggles.push(el);
            }
        }
        const el = toggles[index];
        if (!el) return false;
        try { el.click(); return true; } catch (e) { return false; }
    }
"#;

/// Consent-dismissal call with the given button patterns.
#[must_use]
pub fn consent_script(patterns: &[String]) -> String {
    format!("({CONSENT_CLICK_FN})({})", json_list(patterns))
}

/// Menu-toggle click call for the `index`-th toggle.
#[must_use]
pub fn menu_toggle_script(patterns: &[String], index: usize) -> String {
    format!("({MENU_TOGGLE_FN})({}, {index})", json_list(patterns))
}

fn json_list(patterns: &[String]) -> String {
    serde_json::to_string(patterns).unwrap_or_else(|_| "[]".to_string())
}
