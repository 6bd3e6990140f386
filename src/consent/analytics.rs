use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::types::{AnalyticsLoadState, AnalyticsView};

pub const GTAG_SCRIPT_BASE: &str = "https://www.googletagmanager.com/gtag/js";
pub const COOKIE_FLAGS: &str = "SameSite=None;Secure";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigParams {
    pub anonymize_ip: bool,
    pub cookie_flags: &'static str,
}

impl Default for ConfigParams {
    fn default() -> Self {
        Self {
            anonymize_ip: true,
            cookie_flags: COOKIE_FLAGS,
        }
    }
}

/// One call on the tag's global dispatcher, in the order it was issued.
#[derive(Debug, Clone, PartialEq)]
pub enum GtagCommand {
    Js(DateTime<Utc>),
    Config {
        measurement_id: String,
        params: ConfigParams,
    },
    DenyAnalyticsStorage,
}

impl GtagCommand {
    /// Argument list as it is pushed onto `dataLayer`.
    pub fn to_args(&self) -> Value {
        match self {
            GtagCommand::Js(at) => json!(["js", at.to_rfc3339_opts(SecondsFormat::Millis, true)]),
            GtagCommand::Config {
                measurement_id,
                params,
            } => json!(["config", measurement_id, params]),
            GtagCommand::DenyAnalyticsStorage => {
                json!(["consent", "update", { "analytics_storage": "denied" }])
            }
        }
    }

    fn to_script_line(&self) -> String {
        match self {
            GtagCommand::Js(at) => format!(
                "gtag('js', new Date({}));",
                script_literal(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
            ),
            other => {
                let args = match other.to_args() {
                    Value::Array(args) => args,
                    value => vec![value],
                };
                let rendered: Vec<String> = args.iter().map(|a| script_literal(a)).collect();
                format!("gtag({});", rendered.join(", "))
            }
        }
    }
}

/// The injected tag: its script reference and the command queue it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsTag {
    measurement_id: String,
    script_src: String,
    data_layer: Vec<GtagCommand>,
    state: AnalyticsLoadState,
}

impl AnalyticsTag {
    pub fn bootstrap(measurement_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            measurement_id: measurement_id.to_string(),
            script_src: format!("{GTAG_SCRIPT_BASE}?id={measurement_id}"),
            data_layer: vec![
                GtagCommand::Js(now),
                GtagCommand::Config {
                    measurement_id: measurement_id.to_string(),
                    params: ConfigParams::default(),
                },
            ],
            state: AnalyticsLoadState::Loading,
        }
    }

    pub fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    pub fn script_src(&self) -> &str {
        &self.script_src
    }

    pub fn commands(&self) -> &[GtagCommand] {
        &self.data_layer
    }

    pub fn state(&self) -> AnalyticsLoadState {
        self.state
    }

    pub fn push(&mut self, command: GtagCommand) {
        self.data_layer.push(command);
    }

    /// Marks the tag as emitted to the page. Never moves backwards.
    pub fn confirm_loaded(&mut self) {
        self.state = self.state.max(AnalyticsLoadState::Loaded);
    }

    pub fn view(&self) -> AnalyticsView {
        AnalyticsView::new(&self.script_src, &self.data_layer)
    }

    pub fn render_snippet(&self) -> String {
        let mut out = format!(
            "<script async src={}></script>\n<script>\nwindow.dataLayer = window.dataLayer || [];\nfunction gtag(){{dataLayer.push(arguments);}}\n",
            script_literal(&self.script_src)
        );
        for command in &self.data_layer {
            out.push_str(&command.to_script_line());
            out.push('\n');
        }
        out.push_str("</script>\n");
        out
    }
}

fn script_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}
