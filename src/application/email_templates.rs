//! Lifecycle email templates.
//!
//! Reminder templates form a closed set keyed by the day offset; the worker
//! treats a missing template as a hard error on the task rather than sending
//! a generic fallback.

use chrono::{DateTime, Utc};

use crate::domain::entities::subscription::{Currency, Frequency};

const BRAND_NAME: &str = "rebill";
const COMPANY_NAME: &str = "Rebill Inc.";
const COMPANY_ADDRESS: &str = "123 Main St, Anytown, AN 12345";

/// Everything the templates interpolate.
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub user_name: String,
    pub subscription_name: String,
    pub renewal_date: String,
    pub plan: String,
    pub price: String,
    pub days_left: i64,
    pub account_url: String,
    pub support_url: String,
}

/// Formats an instant the way the emails show dates.
pub fn format_renewal_date(t: DateTime<Utc>) -> String {
    t.format("%b %-d, %Y").to_string()
}

/// "USD 9.99 (monthly)" — price line used in the details box.
pub fn format_price(price_minor: i64, currency: Currency, frequency: Frequency) -> String {
    format!(
        "{} {}.{:02} ({})",
        currency.as_str(),
        price_minor / 100,
        price_minor % 100,
        frequency.as_str()
    )
}

/// Renders the reminder for a day offset. `None` when the offset has no
/// template.
pub fn reminder_email(days_before: i64, data: &TemplateData) -> Option<(String, String)> {
    let subject = match days_before {
        7 => format!(
            "Reminder: Your {} subscription renews in 7 days",
            data.subscription_name
        ),
        5 => format!(
            "{} renews in 5 days - stay subscribed!",
            data.subscription_name
        ),
        2 => format!(
            "2 days left! {} subscription renewal",
            data.subscription_name
        ),
        1 => format!(
            "Final reminder: {} renews tomorrow",
            data.subscription_name
        ),
        _ => return None,
    };

    let lead = format!(
        "Your <strong>{}</strong> subscription is set to renew on <strong>{}</strong> ({} days from today).",
        data.subscription_name, data.renewal_date, data.days_left
    );
    Some((subject, wrap_email(data, &lead)))
}

/// Confirmation sent after the renewal worker has persisted the new period.
pub fn renewal_confirmation_email(data: &TemplateData) -> (String, String) {
    let subject = format!(
        "Your {} subscription has renewed",
        data.subscription_name
    );
    let lead = format!(
        "Your <strong>{}</strong> subscription renewed successfully. The new period runs until <strong>{}</strong>.",
        data.subscription_name, data.renewal_date
    );
    (subject, wrap_email(data, &lead))
}

fn wrap_email(data: &TemplateData, lead: &str) -> String {
    format!(
        r#"<div style="font-family:'Segoe UI',Tahoma,Geneva,Verdana,sans-serif;line-height:1.6;color:#333;max-width:600px;margin:0 auto;background-color:#f4f7fa;">
  <table cellpadding="0" cellspacing="0" border="0" width="100%" style="background-color:#ffffff;border-radius:10px;overflow:hidden;">
    <tr>
      <td style="background-color:#111827;text-align:center;padding:24px;">
        <p style="font-size:32px;line-height:32px;font-weight:800;color:#ffffff;margin:0;">{brand}</p>
      </td>
    </tr>
    <tr>
      <td style="padding:40px 30px;">
        <p style="font-size:16px;margin:0 0 25px;">Hello <strong>{user}</strong>,</p>
        <p style="font-size:16px;margin:0 0 25px;">{lead}</p>
        <table cellpadding="15" cellspacing="0" border="0" width="100%" style="background-color:#f0f7ff;border-radius:10px;margin-bottom:25px;">
          <tr><td style="font-size:16px;border-bottom:1px solid #d0e3ff;"><strong>Plan:</strong> {plan}</td></tr>
          <tr><td style="font-size:16px;"><strong>Price:</strong> {price}</td></tr>
        </table>
        <p style="font-size:16px;margin:0 0 25px;">If you'd like to make changes or cancel your subscription, please visit your <a href="{account_url}" style="color:#111827;">account settings</a> before the renewal date.</p>
        <p style="font-size:16px;margin:0;">Need help? <a href="{support_url}" style="color:#111827;">Contact our support team</a> anytime.</p>
      </td>
    </tr>
    <tr>
      <td style="background-color:#f0f7ff;padding:20px;text-align:center;font-size:13px;color:#6b7280;">
        <p style="margin:0;">{company} | {address}</p>
      </td>
    </tr>
  </table>
</div>"#,
        brand = BRAND_NAME,
        user = data.user_name,
        lead = lead,
        plan = data.plan,
        price = data.price,
        account_url = data.account_url,
        support_url = data.support_url,
        company = COMPANY_NAME,
        address = COMPANY_ADDRESS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(days_left: i64) -> TemplateData {
        TemplateData {
            user_name: "Ada".into(),
            subscription_name: "Streamly".into(),
            renewal_date: "Feb 15, 2025".into(),
            plan: "Streamly".into(),
            price: "USD 9.99 (monthly)".into(),
            days_left,
            account_url: "https://app.example.com/account".into(),
            support_url: "https://example.com/support".into(),
        }
    }

    #[test]
    fn known_offsets_render() {
        for k in [1, 2, 5, 7] {
            let (subject, html) = reminder_email(k, &data(k)).expect("template");
            assert!(subject.contains("Streamly"), "{subject}");
            assert!(html.contains("Ada"));
            assert!(html.contains("USD 9.99"));
        }
    }

    #[test]
    fn unknown_offsets_have_no_template() {
        assert!(reminder_email(3, &data(3)).is_none());
        assert!(reminder_email(0, &data(0)).is_none());
        assert!(reminder_email(30, &data(30)).is_none());
    }

    #[test]
    fn price_formatting_pads_cents() {
        assert_eq!(
            format_price(999, Currency::USD, Frequency::Monthly),
            "USD 9.99 (monthly)"
        );
        assert_eq!(
            format_price(1000, Currency::EUR, Frequency::Yearly),
            "EUR 10.00 (yearly)"
        );
        assert_eq!(
            format_price(105, Currency::GBP, Frequency::Daily),
            "GBP 1.05 (daily)"
        );
    }
}
