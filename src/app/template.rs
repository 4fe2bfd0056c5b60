use std::collections::HashMap;

use crate::domain::notification::NotificationType;

pub const USER_NAME: &str = "userName";
pub const SERVICE_NAME: &str = "serviceName";
pub const DAYS_LEFT: &str = "daysLeft";

/// Replaces every `{key}` whose key is in `vars`. Unknown placeholders and
/// unbalanced braces are left as they are, so a template can be rendered in
/// stages.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push('{');
                        output.push_str(key);
                        output.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

/// Reminder text for a milestone, still carrying `{userName}` and
/// `{serviceName}`.
pub fn reminder_template(notification_type: NotificationType) -> &'static str {
    match notification_type {
        NotificationType::FiveDays | NotificationType::ThreeDays => {
            "Hola {userName}, tu cuenta de {serviceName} vence en {daysLeft} días. \
             Recuerda renovarla para seguir disfrutando del servicio."
        }
        NotificationType::OneDay => {
            "⚠️ Hola {userName}, tu cuenta de {serviceName} vence MAÑANA. \
             Renuévala hoy para evitar la interrupción del servicio."
        }
        NotificationType::Expired => {
            "❌ Hola {userName}, tu cuenta de {serviceName} ha vencido. \
             Ya no podrás acceder a esta cuenta. Contáctanos para renovar tu suscripción."
        }
    }
}

/// Fills in the account-level values and leaves `{userName}` for send time.
pub fn account_message(notification_type: NotificationType, service_name: &str, days_left: i64) -> String {
    let days_left = days_left.to_string();
    let vars = HashMap::from([(SERVICE_NAME, service_name), (DAYS_LEFT, days_left.as_str())]);
    render(reminder_template(notification_type), &vars)
}

pub fn personalize(message: &str, user_name: &str) -> String {
    render(message, &HashMap::from([(USER_NAME, user_name)]))
}
