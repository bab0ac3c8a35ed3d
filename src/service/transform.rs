use crate::db::{MetricRow, Platform};
use crate::google_ads::CustomerId;
use crate::google_ads::types::GoogleAdsRow;
use chrono::NaiveDate;

const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Daily campaign report query for an inclusive date range.
pub fn campaign_metrics_query(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "SELECT segments.date, campaign.id, campaign.name, metrics.impressions, metrics.clicks, \
         metrics.cost_micros, metrics.conversions, metrics.conversions_value \
         FROM campaign \
         WHERE segments.date BETWEEN '{}' AND '{}'",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

/// Turns search rows into metric rows. Rows missing a date or campaign id are dropped.
pub fn to_metric_rows(customer: &CustomerId, rows: Vec<GoogleAdsRow>) -> Vec<MetricRow> {
    rows.into_iter()
        .filter_map(|row| {
            let date = row.segments.as_ref().and_then(|s| s.date)?;
            let campaign = row.campaign?;
            let campaign_id = campaign.id?;
            let metrics = row.metrics.unwrap_or_default();

            let spend = metrics.cost_micros as f64 / MICROS_PER_UNIT;
            let revenue = metrics.conversions_value;
            let impressions = metrics.impressions;
            let clicks = metrics.clicks;
            let conversions = metrics.conversions;

            Some(MetricRow {
                customer_id: customer.as_str().to_string(),
                date,
                campaign_id,
                platform: Platform::GoogleAds,
                campaign_name: campaign.name,
                impressions,
                clicks,
                spend,
                conversions,
                revenue,
                ctr: ratio(clicks as f64, impressions as f64),
                cpc: ratio(spend, clicks as f64),
                cpa: ratio(spend, conversions),
                roas: ratio(revenue, spend),
                conversion_rate: ratio(conversions, clicks as f64),
            })
        })
        .collect()
}

/// `num / den`, or 0 when the denominator is 0.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> GoogleAdsRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn derives_spend_and_ratios() {
        let customer = CustomerId::parse("123-456-7890").unwrap();
        let rows = to_metric_rows(
            &customer,
            vec![row(json!({
                "campaign": {"id": "42", "name": "Brand"},
                "segments": {"date": "2024-03-01"},
                "metrics": {
                    "impressions": "1000",
                    "clicks": "50",
                    "costMicros": "25000000",
                    "conversions": 5.0,
                    "conversionsValue": 100.0
                }
            }))],
        );

        assert_eq!(rows.len(), 1);
        let m = &rows[0];
        assert_eq!(m.customer_id, "1234567890");
        assert_eq!(m.campaign_id, "42");
        assert_eq!(m.platform, Platform::GoogleAds);
        assert!((m.spend - 25.0).abs() < 1e-9);
        assert!((m.ctr - 0.05).abs() < 1e-9);
        assert!((m.cpc - 0.5).abs() < 1e-9);
        assert!((m.cpa - 5.0).abs() < 1e-9);
        assert!((m.roas - 4.0).abs() < 1e-9);
        assert!((m.conversion_rate - 0.1).abs() < 1e-9);
    }

    #[test]
    fn zero_denominators_yield_zero() {
        let customer = CustomerId::parse("1234567890").unwrap();
        let rows = to_metric_rows(
            &customer,
            vec![row(json!({
                "campaign": {"id": "7"},
                "segments": {"date": "2024-03-01"},
                "metrics": {}
            }))],
        );
        let m = &rows[0];
        assert_eq!(m.ctr, 0.0);
        assert_eq!(m.cpc, 0.0);
        assert_eq!(m.cpa, 0.0);
        assert_eq!(m.roas, 0.0);
        assert_eq!(m.conversion_rate, 0.0);
    }

    #[test]
    fn rows_without_date_or_campaign_are_skipped() {
        let customer = CustomerId::parse("1234567890").unwrap();
        let rows = to_metric_rows(
            &customer,
            vec![
                row(json!({"campaign": {"id": "7"}})),
                row(json!({"segments": {"date": "2024-03-01"}})),
            ],
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn query_uses_inclusive_iso_dates() {
        let q = campaign_metrics_query(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        );
        assert!(q.contains("BETWEEN '2024-03-01' AND '2024-03-07'"));
        assert!(q.contains("metrics.cost_micros"));
    }
}
