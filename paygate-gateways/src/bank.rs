//! Bank name to clearing code mapping for card payouts.

use serde_json::Value;
use tracing::{debug, warn};

use paygate_types::{HttpRequest, HttpTransport, Params};

const CARD_BIN_URL: &str = "https://ccdcapi.alipay.com/validateAndCacheCardInfo.json";

static BANK_CODES: &[(&str, &str)] = &[
    ("工商银行", "ICBC"),
    ("建设银行", "CCB"),
    ("农业银行", "ABC"),
    ("邮政储蓄银行", "PSBC"),
    ("中国银行", "BOC"),
    ("交通银行", "BCM"),
    ("招商银行", "CMB"),
    ("光大银行", "CEB"),
    ("浦发银行", "SPDB"),
    ("华夏银行", "HXB"),
    ("广东发展银行", "GDB"),
    ("中信银行", "CNCB"),
    ("兴业银行", "CIB"),
    ("民生银行", "CMBC"),
    ("杭州银行", "HZB"),
    ("上海银行", "SHB"),
    ("宁波银行", "NBB"),
    ("平安银行", "PAB"),
    ("上海农商银行", "SHNSB"),
    ("企业银行", "QYB"),
    ("云南省农村信用社", "YNNXB"),
    ("海南省农村信用社", "HNNXB"),
    ("广西农村信用社", "GXNXB"),
    ("湖北农信", "HBNXB"),
    ("福建省农村信用社", "FJNXB"),
    ("江苏省农村信用社联合社", "JSNXB"),
    ("徽商银行", "WSB"),
    ("恒丰银行", "HFB"),
    ("重庆农村商业银行", "CQNSB"),
    ("常熟农村商业银行", "CSNSB"),
    ("吴江农村商业银行", "WJNSB"),
    ("昆仑银行", "KLB"),
    ("乌鲁木齐市商业银行", "WLMQSB"),
    ("宁夏银行", "NXB"),
    ("青海银行", "QHB"),
    ("兰州银行", "LANZB"),
    ("富滇银行", "FDB"),
    ("贵阳银行", "GYB"),
    ("绵阳市商业银行", "MYSB"),
    ("德阳银行", "DYB"),
    ("攀枝花市商业银行", "PZHSB"),
    ("重庆银行", "CQB"),
    ("柳州银行", "LIUZB"),
    ("汉口银行", "HANKB"),
    ("天津农商银行", "TJNSB"),
    ("武汉农村商业银行", "WHNSB"),
    ("洛阳银行", "LUOYB"),
    ("郑州银行", "ZZB"),
    ("北京银行", "BJB"),
    ("天津银行", "TJB"),
    ("广州银行", "GZB"),
    ("珠海华润银行", "ZHHRB"),
    ("东莞银行", "DGB"),
    ("广州农村商业银行", "GZNSB"),
    ("顺德农村商业银行", "SDNSB"),
    ("德州银行", "DEZB"),
    ("潍坊银行", "LNGFB"),
    ("赣州银行", "GANZB"),
    ("福建海峡银行", "FJHXB"),
    ("浙江民泰商业银行", "ZJMTSB"),
    ("平顶山银行", "PDSB"),
    ("渤海银行", "BHB"),
    ("北京农村商业银行", "BJNSB"),
    ("太仓农商行", "TCNSB"),
    ("东莞农村商业银行", "DGNSB"),
    ("四川省联社", "SCLS"),
    ("新韩银行", "XHB"),
    ("韩亚银行", "HYB"),
    ("大连银行", "DLB"),
    ("鞍山市商业银行", "ANSSB"),
    ("锦州银行", "JINZB"),
    ("葫芦岛银行", "HLDB"),
    ("温州银行", "WENZB"),
    ("湖州银行", "HUZB"),
    ("浙江稠州商业银行", "ZJZZSB"),
    ("浙江泰隆商业银行", "ZJLTSB"),
    ("厦门银行", "XMB"),
    ("南昌银行", "NANCB"),
    ("上饶银行", "SHNGRB"),
    ("青岛银行", "QDB"),
    ("齐商银行", "QISB"),
    ("东营银行", "DNGYB"),
    ("烟台银行", "YANTB"),
    ("济宁银行", "JINB"),
    ("泰安市商业银行", "TAIASB"),
    ("莱商银行", "LAISB"),
    ("威海市商业银行", "WEIHSB"),
    ("临商银行", "LINTB"),
    ("日照银行", "RIZB"),
    ("长沙银行", "CSB"),
    ("广西北部湾银行", "GXBBWB"),
    ("自贡市商业银行", "ZGSB"),
    ("昆山农村商业银行", "KUNSNSB"),
    ("张家港农村商业银行", "ZJGNSB"),
    ("浙商银行", "ZSB"),
    ("苏州银行", "SZB"),
    ("鄞州银行", "JNZB"),
    ("安徽省农村信用社", "AHNXS"),
    ("黄河农村商业银行", "HHNSB"),
    ("河北银行", "HBB"),
    ("邯郸市商业银行", "HANDSB"),
    ("邢台银行", "XNGTB"),
    ("张家口市商业银行", "ZJKSB"),
    ("承德银行", "CHGDEB"),
    ("沧州银行", "CNGZB"),
    ("晋商银行网上银行", "JINSB"),
    ("晋城银行", "JINCB"),
    ("内蒙古银行", "NMGB"),
    ("包商银行", "BAOSB"),
    ("鄂尔多斯银行", "EEDSB"),
    ("营口银行", "YNGKB"),
];

/// Code for a Chinese bank name from the static table.
pub fn code_for_name(bank_name: &str) -> Option<&'static str> {
    let bank_name = bank_name.trim();
    BANK_CODES
        .iter()
        .find(|(name, _)| *name == bank_name)
        .map(|(_, code)| *code)
}

/// Resolves the bank code for a payout card.
///
/// Known names come from the table. Otherwise the card BIN service is asked;
/// when it cannot identify the card the given name is returned unchanged.
pub async fn resolve_bank_code(
    http: &dyn HttpTransport,
    card_no: &str,
    bank_name: &str,
) -> String {
    if let Some(code) = code_for_name(bank_name) {
        return code.to_string();
    }

    let query = Params::new()
        .with("_input_charset", "utf-8")
        .with("cardNo", card_no)
        .with("cardBinCheck", "true");
    let looked_up = match http.send(HttpRequest::get(CARD_BIN_URL, query)).await {
        Ok(resp) => resp.json().ok().and_then(|v| bin_lookup_bank(&v)),
        Err(e) => {
            warn!("Card BIN lookup failed: {}", e);
            None
        }
    };

    match looked_up {
        Some(code) => {
            debug!(bank = %code, "Resolved bank code from card BIN");
            code
        }
        None => bank_name.to_string(),
    }
}

fn bin_lookup_bank(value: &Value) -> Option<String> {
    if value.get("validated").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    value.get("bank").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[test]
    fn test_known_bank_names() {
        assert_eq!(code_for_name("工商银行"), Some("ICBC"));
        assert_eq!(code_for_name(" 招商银行 "), Some("CMB"));
        assert_eq!(code_for_name("营口银行"), Some("YNGKB"));
        assert_eq!(code_for_name("火星银行"), None);
    }

    #[tokio::test]
    async fn test_table_hit_skips_lookup() {
        let http = MockTransport::new();
        let code = resolve_bank_code(http.as_ref(), "6222000000000000", "建设银行").await;
        assert_eq!(code, "CCB");
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_name_uses_card_bin_service() {
        let http = MockTransport::new();
        http.push_json(serde_json::json!({"validated": true, "bank": "SPABANK", "cardType": "DC"}));

        let code = resolve_bank_code(http.as_ref(), "6230580000000000", "某某银行").await;
        assert_eq!(code, "SPABANK");

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, CARD_BIN_URL);
        assert_eq!(requests[0].query.get("cardNo"), Some("6230580000000000"));
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_name() {
        let http = MockTransport::new();
        http.push_json(serde_json::json!({"validated": false}));
        let code = resolve_bank_code(http.as_ref(), "123", "某某银行").await;
        assert_eq!(code, "某某银行");

        // no scripted response at all behaves the same
        let code = resolve_bank_code(http.as_ref(), "123", "某某银行").await;
        assert_eq!(code, "某某银行");
    }
}
