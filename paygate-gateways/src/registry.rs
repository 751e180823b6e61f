//! Provider name to adapter.

use std::sync::Arc;

use paygate_types::{Gateway, GatewayConfig, HttpTransport, PayError};

use crate::providers::{
    Alipay, Cypay, Feilong, Jiupay, Jpay, Kkdf, Salipay, Tianxia, Tongyi, Wechat, Wtpay, Wukong,
    Xfpay, Xincheng, Xmfdf, Yinhai, Yongli,
};

/// Every provider name `build_gateway` understands.
pub const GATEWAY_NAMES: &[&str] = &[
    "alipay", "cypay", "feilong", "jiupay", "jpay", "kkdf", "salipay", "tianxia", "tongyi",
    "wechat", "wtpay", "wukong", "xfpay", "xincheng", "xmfdf", "yinhai", "yongli",
];

/// Builds the adapter for `name` (case-insensitive).
pub fn build_gateway(
    name: &str,
    config: GatewayConfig,
    http: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn Gateway>, PayError> {
    let gateway: Arc<dyn Gateway> = match name.to_ascii_lowercase().as_str() {
        "alipay" => Arc::new(Alipay::new(config, http)),
        "cypay" => Arc::new(Cypay::new(config, http)),
        "feilong" => Arc::new(Feilong::new(config, http)),
        "jiupay" => Arc::new(Jiupay::new(config, http)),
        "jpay" => Arc::new(Jpay::new(config, http)),
        "kkdf" => Arc::new(Kkdf::new(config, http)),
        "salipay" => Arc::new(Salipay::new(config, http)),
        "tianxia" => Arc::new(Tianxia::new(config, http)),
        "tongyi" => Arc::new(Tongyi::new(config, http)),
        "wechat" => Arc::new(Wechat::new(config, http)),
        "wtpay" => Arc::new(Wtpay::new(config, http)),
        "wukong" => Arc::new(Wukong::new(config, http)),
        "xfpay" => Arc::new(Xfpay::new(config, http)),
        "xincheng" => Arc::new(Xincheng::new(config, http)),
        "xmfdf" => Arc::new(Xmfdf::new(config, http)),
        "yinhai" => Arc::new(Yinhai::new(config, http)),
        "yongli" => Arc::new(Yongli::new(config, http)),
        _ => {
            return Err(PayError::InvalidGateway(format!(
                "Gateway [{}] Not Exists",
                name
            )));
        }
    };
    Ok(gateway)
}
