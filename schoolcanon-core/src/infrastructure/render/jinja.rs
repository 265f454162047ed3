// schoolcanon-core/src/infrastructure/render/jinja.rs

// Renders the data dictionary. The catalog context is plain JSON built by the
// application layer; the template only lays it out as Markdown.

use minijinja::Environment;

use crate::error::CanonError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::renderer::TemplateEngine;

pub const CATALOG_TEMPLATE: &str = r#"# {{ project }} data dictionary

Generated {{ generated_at }}. Canonical schema version {{ schema_version }}.
{% if last_run %}
Last run: {{ last_run.generated_at }} ({% if last_run.success %}success{% else %}failed{% endif %}, {{ last_run.elapsed | secs }}).
{% else %}
No run results found yet.
{% endif %}
{% for ds in datasets %}
## `{{ ds.name }}`

Entity key: {{ ds.key | map("code") | join(", ") }}. Population field: {{ ds.population | code }}.{% if ds.rows is number %} Rows in last run: {{ ds.rows }}.{% endif %}

| # | column | type | kind |
|---|---|---|---|
{% for col in ds.columns -%}
| {{ loop.index }} | {{ col.name | code }} | {{ col.sql_type }} | {{ col.kind }} |
{% endfor %}
{% endfor %}
## Vintages

| id | dataset | adapter | years | precedence | scope | rollup | last run | description |
|---|---|---|---|---|---|---|---|---|
{% for v in vintages -%}
| {{ v.id | code }} | {{ v.dataset }} | {{ v.adapter }} | {{ v.years }} | {{ v.precedence }} | {{ v.scope }} | {% if v.has_rollup %}native{% else %}synthesized{% endif %} | {% if v.last_status %}{{ v.last_status }}{% else %}-{% endif %} | {% if v.description %}{{ v.description | cell }}{% endif %} |
{% endfor %}"#;

pub struct JinjaRenderer<'a> {
    env: Environment<'a>,
}

impl<'a> JinjaRenderer<'a> {
    pub fn new() -> Self {
        let mut env = Environment::new();

        // Inline code span
        env.add_filter("code", |value: String| format!("`{}`", value));

        // Table cells cannot hold pipes or line breaks
        env.add_filter("cell", |value: String| {
            value.replace('|', "\\|").replace(['\n', '\r'], " ")
        });

        env.add_filter("secs", |value: f64| format!("{:.2}s", value));

        Self { env }
    }
}

impl<'a> Default for JinjaRenderer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TemplateEngine for JinjaRenderer<'a> {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, CanonError> {
        self.env
            .render_str(template, context)
            .map_err(|e| CanonError::Infrastructure(InfrastructureError::TemplateError(e)))
    }
}
