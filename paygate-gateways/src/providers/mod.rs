//! One adapter per provider.

mod alipay;
mod cypay;
mod feilong;
mod jiupay;
mod jpay;
mod kkdf;
mod salipay;
mod tianxia;
mod tongyi;
mod wechat;
mod wtpay;
mod wukong;
mod xfpay;
mod xincheng;
mod xmfdf;
mod yinhai;
mod yongli;

pub use alipay::Alipay;
pub use cypay::Cypay;
pub use feilong::Feilong;
pub use jiupay::Jiupay;
pub use jpay::Jpay;
pub use kkdf::Kkdf;
pub use salipay::Salipay;
pub use tianxia::Tianxia;
pub use tongyi::Tongyi;
pub use wechat::Wechat;
pub use wtpay::Wtpay;
pub use wukong::Wukong;
pub use xfpay::Xfpay;
pub use xincheng::Xincheng;
pub use xmfdf::Xmfdf;
pub use yinhai::Yinhai;
pub use yongli::Yongli;

use paygate_types::{Amount, Gateway, PayError, PayMethod, Params, PurchaseResult, parse_provider_time};

/// How an aggregator hands the payer over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggregatorFormat {
    /// The API returns a URL (QR code or cashier page).
    PayStr,
    /// The payer is posted to the provider's page.
    JumpPage,
}

impl AggregatorFormat {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AggregatorFormat::PayStr => "pay_str",
            AggregatorFormat::JumpPage => "jump_page",
        }
    }
}

/// Channel code shared by the 911pay-style aggregators.
pub(crate) fn aggregator_pay_type(method: &str) -> &'static str {
    match method {
        "wechat" => "901",
        "wechat_scan" => "902",
        "alipay" => "903",
        "alipay_scan" => "904",
        "qq" => "905",
        "qq_scan" => "906",
        "un" => "907",
        "un_kj" => "908",
        "un_v1" => "909",
        "un_scan" => "910",
        _ => "",
    }
}

pub(crate) fn aggregator_format(method: &str) -> Option<AggregatorFormat> {
    match method {
        "wechat" | "wechat_scan" | "alipay" | "alipay_scan" | "qq" | "qq_scan" | "un_scan" => {
            Some(AggregatorFormat::PayStr)
        }
        "un" | "un_kj" | "un_v1" => Some(AggregatorFormat::JumpPage),
        _ => None,
    }
}

/// Rejects methods the gateway has no sub-gateway for.
pub(crate) fn ensure_method(gateway: &dyn Gateway, method: PayMethod) -> Result<(), PayError> {
    if gateway.methods().contains(&method) {
        return Ok(());
    }
    Err(PayError::InvalidGateway(format!(
        "Pay Gateway [{}] not exists",
        method
    )))
}

/// Normalizes the `out_biz_no`/`orderstatus`/`endtime` notification shared by
/// the Alipay payout resellers. `orderstatus == 1` means paid out.
pub(crate) fn payout_notification(
    channel: &str,
    mut data: Params,
) -> Result<PurchaseResult, PayError> {
    let err_msg = data.get_or_empty("apiremark").to_string();
    let status: i64 = data
        .get_or_empty("orderstatus")
        .trim()
        .parse()
        .unwrap_or_default();
    data.insert("err_msg", err_msg);
    data.insert("status", status.to_string());

    let order_id = data.require("out_biz_no")?.to_string();
    let trade_no = data.get_or_empty("order_id").to_string();
    let pay_time = parse_provider_time(data.get("endtime"));

    Ok(PurchaseResult::new(
        channel,
        order_id,
        trade_no,
        Amount::ZERO,
        status == 1,
        pay_time,
        data,
    ))
}
