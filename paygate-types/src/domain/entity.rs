//! Concrete chargeable and transferable records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Amount, Params};
use crate::ports::{Payable, Transferable};

/// A merchant order awaiting payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub trade_no: String,
    pub amount: Amount,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    /// Provider hints such as `method`, `client_ip` or `orderdate`.
    #[serde(default)]
    pub extras: Params,
    #[serde(default)]
    pub expire: Option<NaiveDateTime>,
    #[serde(default)]
    pub complete: bool,
}

impl Charge {
    pub fn new(trade_no: impl Into<String>, amount: Amount) -> Self {
        Self {
            trade_no: trade_no.into(),
            amount,
            user: String::new(),
            subject: String::new(),
            body: String::new(),
            extras: Params::new(),
            expire: None,
            complete: false,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(name, value);
        self
    }
}

impl Payable for Charge {
    fn trade_no(&self) -> &str {
        &self.trade_no
    }

    fn amount(&self) -> Amount {
        self.amount
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn extra(&self, name: &str) -> Option<&str> {
        self.extras.get(name)
    }

    fn expire(&self) -> Option<NaiveDateTime> {
        self.expire
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

/// A disbursement to a payee account (bank card or Alipay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub transfer_no: String,
    pub amount: Amount,
    pub real_name: String,
    pub account: String,
    /// Bank name for card payouts, provider channel otherwise.
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub extras: Params,
}

impl Payout {
    pub fn new(
        transfer_no: impl Into<String>,
        amount: Amount,
        real_name: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            transfer_no: transfer_no.into(),
            amount,
            real_name: real_name.into(),
            account: account.into(),
            channel: String::new(),
            remark: String::new(),
            extras: Params::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }
}

impl Transferable for Payout {
    fn transfer_no(&self) -> &str {
        &self.transfer_no
    }

    fn extra(&self, name: &str) -> Option<&str> {
        self.extras.get(name)
    }

    fn amount(&self) -> Amount {
        self.amount
    }

    fn real_name(&self) -> &str {
        &self.real_name
    }

    fn account(&self) -> &str {
        &self.account
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn remark(&self) -> &str {
        &self.remark
    }
}
