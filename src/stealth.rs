//! Anti-detection measures applied with `--stealth`.
//!
//! Two halves: launch flags (see [`crate::chrome::browser_args`]) and a
//! script registered to run before any page script on every new document.

/// A desktop Chrome user agent without the "Chrome for Testing" or
/// "HeadlessChrome" markers.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Patches the navigator and related APIs that bot detectors probe.
pub const SCRIPT: &str = r"
(() => {
    const define = (obj, prop, getter) => {
        try {
            Object.defineProperty(obj, prop, { get: getter, configurable: true });
        } catch (_) {}
    };

    define(Navigator.prototype, 'webdriver', () => undefined);
    try { delete Object.getPrototypeOf(navigator).webdriver; } catch (_) {}

    const fakePlugins = [
        { name: 'PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'Chromium PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'Microsoft Edge PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
        { name: 'WebKit built-in PDF', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
    ];
    const pluginArray = Object.create(PluginArray.prototype);
    fakePlugins.forEach((p, i) => {
        const plugin = Object.create(Plugin.prototype);
        define(plugin, 'name', () => p.name);
        define(plugin, 'filename', () => p.filename);
        define(plugin, 'description', () => p.description);
        define(plugin, 'length', () => 0);
        pluginArray[i] = plugin;
        pluginArray[p.name] = plugin;
    });
    define(pluginArray, 'length', () => fakePlugins.length);
    pluginArray.item = (i) => pluginArray[i] || null;
    pluginArray.namedItem = (n) => pluginArray[n] || null;
    pluginArray.refresh = () => {};
    define(Navigator.prototype, 'plugins', () => pluginArray);

    define(Navigator.prototype, 'languages', () => ['en-US', 'en']);
    define(Navigator.prototype, 'hardwareConcurrency', () => 8);
    define(Navigator.prototype, 'deviceMemory', () => 8);

    if (navigator.permissions && navigator.permissions.query) {
        const originalQuery = navigator.permissions.query.bind(navigator.permissions);
        navigator.permissions.query = (params) =>
            params && params.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission, onchange: null })
                : originalQuery(params);
    }

    if (!window.chrome) {
        window.chrome = {};
    }
    window.chrome.runtime = window.chrome.runtime || {
        connect: () => {},
        sendMessage: () => {},
    };
    window.chrome.loadTimes = window.chrome.loadTimes || (() => ({}));
    window.chrome.csi = window.chrome.csi || (() => ({}));
    window.chrome.app = window.chrome.app || { isInstalled: false };

    const originalAttachShadow = Element.prototype.attachShadow;
    if (originalAttachShadow) {
        Element.prototype.attachShadow = function (init) {
            return originalAttachShadow.call(this, { ...init, mode: 'open' });
        };
    }

    const VENDOR = 0x9245;
    const RENDERER = 0x9246;
    const patchGl = (proto) => {
        if (!proto) return;
        const getParameter = proto.getParameter;
        proto.getParameter = function (param) {
            if (param === VENDOR) return 'Intel Inc.';
            if (param === RENDERER) return 'Intel Iris OpenGL Engine';
            return getParameter.call(this, param);
        };
    };
    patchGl(window.WebGLRenderingContext && WebGLRenderingContext.prototype);
    patchGl(window.WebGL2RenderingContext && WebGL2RenderingContext.prototype);

    define(window, 'outerWidth', () => window.innerWidth);
    define(window, 'outerHeight', () => window.innerHeight + 85);

    console.log('[stealth] Anti-detection measures applied');
})();
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_has_no_automation_markers() {
        assert!(!USER_AGENT.contains("Headless"));
        assert!(!USER_AGENT.contains("for Testing"));
        assert!(USER_AGENT.contains("Chrome/120.0.0.0"));
        assert!(!USER_AGENT.contains("  "));
    }

    #[test]
    fn script_hides_webdriver() {
        assert!(SCRIPT.contains("'webdriver'"));
        assert!(SCRIPT.trim_start().starts_with("(() => {"));
        assert!(SCRIPT.trim_end().ends_with("})();"));
    }
}
