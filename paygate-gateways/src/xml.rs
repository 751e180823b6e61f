//! Flat `<xml>` documents used by Wechat v2.

use std::collections::BTreeMap;

use paygate_types::{PayError, Params};

/// Numeric values go out bare, everything else wrapped in CDATA.
pub fn to_xml(params: &Params) -> String {
    let mut xml = String::from("<xml>");
    for (key, value) in params.iter() {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            xml.push_str(&format!("<{key}>{value}</{key}>"));
        } else {
            let value = value.replace("]]>", "]]]]><![CDATA[>");
            xml.push_str(&format!("<{key}><![CDATA[{value}]]></{key}>"));
        }
    }
    xml.push_str("</xml>");
    xml
}

/// Children of the root element as parameters.
pub fn from_xml(xml: &str) -> Result<Params, PayError> {
    if xml.trim().is_empty() {
        return Err(PayError::InvalidArgument("Convert Empty Xml To Array".into()));
    }
    let map: BTreeMap<String, String> = quick_xml::de::from_str(xml)
        .map_err(|e| PayError::InvalidArgument(format!("Invalid xml: {}", e)))?;
    Ok(map.into_iter().collect())
}
