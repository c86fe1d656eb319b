//! Placeholder substitution for outgoing message and title templates.

/// Values available to message/title templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub monitor_id: &'a str,
    pub service_id: &'a str,
    /// Canonical (non-API) service URL.
    pub service_url: &'a str,
    pub version: &'a str,
}

/// Substitutes every occurrence of every placeholder.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    template
        .replace("${monitor_id}", ctx.monitor_id)
        .replace("${service_id}", ctx.service_id)
        .replace("${service_url}", ctx.service_url)
        .replace("${version}", ctx.version)
}

/// Content-regex patterns additionally support `${version_no_v}`, the version
/// with every `v` stripped.
pub fn render_content_pattern(pattern: &str, version: &str) -> String {
    pattern
        .replace("${version}", version)
        .replace("${version_no_v}", &version.replace('v', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_occurrences() {
        let ctx = TemplateContext {
            monitor_id: "gitea",
            service_id: "go-gitea/gitea",
            service_url: "https://github.com/go-gitea/gitea",
            version: "1.14.3",
        };
        let out = render("<${service_url}|${service_id}> - ${version} / ${version}", &ctx);
        assert_eq!(
            out,
            "<https://github.com/go-gitea/gitea|go-gitea/gitea> - 1.14.3 / 1.14.3"
        );
    }

    #[test]
    fn content_pattern_strips_v() {
        let out = render_content_pattern("app-${version_no_v}_amd64\\.deb", "v1.2.3");
        assert_eq!(out, "app-1.2.3_amd64\\.deb");
    }
}
