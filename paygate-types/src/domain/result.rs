//! Normalized payment and transfer outcomes.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{Amount, Params};

/// Outcome of a verified purchase notification.
///
/// Only built after the provider's signature has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResult {
    channel: String,
    order_id: String,
    trade_no: String,
    amount: Amount,
    is_paid: bool,
    pay_time: NaiveDateTime,
    raw: Params,
}

impl PurchaseResult {
    pub fn new(
        channel: impl Into<String>,
        order_id: impl Into<String>,
        trade_no: impl Into<String>,
        amount: Amount,
        is_paid: bool,
        pay_time: NaiveDateTime,
        raw: Params,
    ) -> Self {
        Self {
            channel: channel.into(),
            order_id: order_id.into(),
            trade_no: trade_no.into(),
            amount,
            is_paid,
            pay_time,
            raw,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Merchant order number.
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Provider-side order number.
    pub fn trade_no(&self) -> &str {
        &self.trade_no
    }

    /// Zero when the provider does not report an amount.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn is_paid(&self) -> bool {
        self.is_paid
    }

    pub fn pay_time(&self) -> NaiveDateTime {
        self.pay_time
    }

    pub fn raw(&self) -> &Params {
        &self.raw
    }

    pub fn raw_value(&self, name: &str) -> Option<&str> {
        self.raw.get(name)
    }
}

/// Provider confirmation of a disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    trade_no: String,
    pay_date: NaiveDateTime,
}

impl TransferResult {
    pub fn new(trade_no: impl Into<String>, pay_date: NaiveDateTime) -> Self {
        Self {
            trade_no: trade_no.into(),
            pay_date,
        }
    }

    pub fn trade_no(&self) -> &str {
        &self.trade_no
    }

    pub fn pay_date(&self) -> NaiveDateTime {
        self.pay_date
    }
}

/// What a provider told us after a transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Settled synchronously.
    Completed(TransferResult),
    /// Accepted; the result arrives through a notification.
    Accepted,
}

impl TransferOutcome {
    pub fn result(&self) -> Option<&TransferResult> {
        match self {
            TransferOutcome::Completed(result) => Some(result),
            TransferOutcome::Accepted => None,
        }
    }
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parses the timestamp shapes providers send.
///
/// Accepts `2024-01-31 12:00:00`, `20240131120000`, unix seconds and unix
/// milliseconds. Anything else yields the current local time.
pub fn parse_provider_time(raw: Option<&str>) -> NaiveDateTime {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now();
    };

    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return t;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        if raw.len() == 14 {
            if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S") {
                return t;
            }
        }
        let ts = raw.parse::<i64>().ok().and_then(|n| {
            if raw.len() == 13 {
                DateTime::from_timestamp_millis(n)
            } else {
                DateTime::from_timestamp(n, 0)
            }
        });
        if let Some(ts) = ts {
            return ts.with_timezone(&Local).naive_local();
        }
    }

    now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_formatted_times() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        assert_eq!(parse_provider_time(Some("2024-01-31 12:30:05")), expected);
        assert_eq!(parse_provider_time(Some("20240131123005")), expected);
    }

    #[test]
    fn test_parse_unix_seconds_matches_local_clock() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0)
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(parse_provider_time(Some("1700000000")), expected);
        assert_eq!(parse_provider_time(Some("1700000000000")), expected);
    }

    #[test]
    fn test_unparseable_time_falls_back_to_now() {
        let before = now();
        let parsed = parse_provider_time(Some("yesterday"));
        assert!(parsed >= before);
        assert!(parse_provider_time(None) >= before);
    }

    #[test]
    fn test_purchase_result_accessors() {
        let raw = Params::new().with("foo", "bar");
        let result = PurchaseResult::new(
            "jiupay",
            "T100",
            "P200",
            Amount::from_fen(990).unwrap(),
            true,
            now(),
            raw,
        );
        assert_eq!(result.channel(), "jiupay");
        assert_eq!(result.order_id(), "T100");
        assert_eq!(result.trade_no(), "P200");
        assert_eq!(result.amount().fen(), 990);
        assert!(result.is_paid());
        assert_eq!(result.raw_value("foo"), Some("bar"));
        assert_eq!(result.raw_value("missing"), None);
    }
}
