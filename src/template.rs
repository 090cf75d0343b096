/// `{placeholder}` substitution for file-name and series-name templates.
///
/// Placeholders are `{` + identifier + `}`. Every placeholder in a template
/// must have a value; there is no escaping.
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Names of all placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Replace each `{key}` in `template` with its value from `vars`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .iter()
            .find(|(k, _)| *k == key.as_str())
            .map(|(_, v)| *v)
            .ok_or_else(|| TemplateError::Unknown {
                template: template.to_string(),
                key: key.as_str().to_string(),
            })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    Unknown { template: String, key: String },
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::Unknown { template, key } => {
                write!(f, "unknown placeholder {{{key}}} in template \"{template}\"")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_count() {
        let name = render("pbtask_only_log_t{n}_p{n}.txt", &[("n", "7")]).unwrap();
        assert_eq!(name, "pbtask_only_log_t7_p7.txt");
    }

    #[test]
    fn test_render_multiple_keys() {
        let name = render("{dir}_2queue_{n}", &[("dir", "des_perf"), ("n", "3")]).unwrap();
        assert_eq!(name, "des_perf_2queue_3");
    }

    #[test]
    fn test_render_without_placeholders() {
        assert_eq!(render("tbb_log.txt", &[]).unwrap(), "tbb_log.txt");
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let err = render("{dir}_{threads}", &[("dir", "x")]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unknown {
                template: "{dir}_{threads}".to_string(),
                key: "threads".to_string(),
            }
        );
        assert!(err.to_string().contains("{threads}"));
    }

    #[test]
    fn test_braces_without_identifier_are_literal() {
        assert_eq!(render("a{}b{1x}", &[]).unwrap(), "a{}b{1x}");
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        assert_eq!(placeholders("{dir}/log_t{n}_p{n}"), vec!["dir", "n", "n"]);
    }
}
