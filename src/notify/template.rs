use serde::{Deserialize, Serialize};

use crate::models::LostPetReport;
use crate::services::RenderedMessage;

/// Message template with `{{placeholder}}` substitution
///
/// Supported placeholders: `{{animalName}}`, `{{species}}`, `{{breed}}`,
/// `{{color}}`, `{{location}}`, `{{reportDate}}` on alert messages;
/// `{{count}}`, `{{digestKind}}`, `{{lines}}` on digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTemplate {
    pub subject: String,
    pub body: String,
}

impl NotificationTemplate {
    pub fn render(&self, vars: &[(&str, String)]) -> RenderedMessage {
        RenderedMessage {
            subject: substitute(&self.subject, vars),
            body: substitute(&self.body, vars),
        }
    }
}

fn substitute(text: &str, vars: &[(&str, String)]) -> String {
    let mut out = text.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

/// The templates the dispatcher renders, keyed by trigger type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSet {
    pub alert_match: NotificationTemplate,
    pub digest: NotificationTemplate,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            alert_match: NotificationTemplate {
                subject: "New {{species}} report near you".to_string(),
                body: "{{animalName}} ({{color}} {{species}}) was reported near \
                       {{location}} on {{reportDate}}."
                    .to_string(),
            },
            digest: NotificationTemplate {
                subject: "Your {{digestKind}} lost & found digest ({{count}} new)".to_string(),
                body: "{{count}} new reports matched your alerts:\n{{lines}}".to_string(),
            },
        }
    }
}

/// Placeholder values for one report
pub fn report_vars(report: &LostPetReport) -> Vec<(&'static str, String)> {
    let animal_name = report
        .pet_name
        .clone()
        .unwrap_or_else(|| format!("A {}", report.species));
    vec![
        ("animalName", animal_name),
        ("species", report.species.clone()),
        ("breed", report.breed.clone().unwrap_or_else(|| "unknown breed".to_string())),
        ("color", report.color.clone()),
        ("location", report.location.address.clone()),
        ("reportDate", report.date_time_lost_found.format("%Y-%m-%d").to_string()),
    ]
}
