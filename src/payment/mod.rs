use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::WalletConfig;

type HmacSha256 = Hmac<Sha256>;

pub const REQUEST_TYPE_CAPTURE_WALLET: &str = "captureWallet";

pub const RESULT_CODE_SUCCESS: i64 = 0;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider transport failed: {0}")]
    Transport(String),

    #[error("payment provider rejected request: [{result_code}] {message}")]
    Provider { result_code: i64, message: String },

    #[error("payment signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimePaymentRequest {
    pub partner_code: String,
    pub request_id: String,
    pub amount: i64,
    pub order_id: String,
    pub order_info: String,
    pub redirect_url: String,
    pub ipn_url: String,
    pub request_type: String,
    pub extra_data: String,
    pub signature: String,
}

impl OneTimePaymentRequest {
    pub fn new(
        wallet: &WalletConfig,
        request_id: String,
        amount: i64,
        order_id: String,
        order_info: String,
    ) -> Result<Self, PaymentError> {
        let mut request = Self {
            partner_code: wallet.partner_code.clone(),
            request_id,
            amount,
            order_id,
            order_info,
            redirect_url: wallet.return_url.clone(),
            ipn_url: wallet.ipn_url.clone(),
            request_type: REQUEST_TYPE_CAPTURE_WALLET.to_string(),
            extra_data: String::new(),
            signature: String::new(),
        };
        request.signature = hmac_hex(
            &request.canonical_string(&wallet.access_key),
            &wallet.secret_key,
        )?;
        Ok(request)
    }

    fn canonical_string(&self, access_key: &str) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&ipnUrl={}&orderId={}&orderInfo={}\
             &partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
            access_key,
            self.amount,
            self.extra_data,
            self.ipn_url,
            self.order_id,
            self.order_info,
            self.partner_code,
            self.redirect_url,
            self.request_id,
            self.request_type,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

impl PaymentCallback {
    pub fn is_valid_signature(&self, access_key: &str, secret_key: &str) -> bool {
        let Ok(claimed) = hex::decode(&self.signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret_key.as_bytes()) else {
            return false;
        };
        mac.update(self.canonical_string(access_key).as_bytes());
        mac.verify_slice(&claimed).is_ok()
    }

    pub fn compute_signature(
        &self,
        access_key: &str,
        secret_key: &str,
    ) -> Result<String, PaymentError> {
        hmac_hex(&self.canonical_string(access_key), secret_key)
    }

    fn canonical_string(&self, access_key: &str) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}\
             &orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}\
             &resultCode={}&transId={}",
            access_key,
            self.amount,
            self.extra_data,
            self.message,
            self.order_id,
            self.order_info,
            self.order_type,
            self.partner_code,
            self.pay_type,
            self.request_id,
            self.response_time,
            self.result_code,
            self.trans_id,
        )
    }
}

fn hmac_hex(payload: &str, secret_key: &str) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|err| PaymentError::Signing(err.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentLink {
    pub pay_url: String,
    pub deeplink: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkResponse {
    result_code: i64,
    message: String,
    #[serde(default)]
    pay_url: Option<String>,
    #[serde(default)]
    deeplink: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &OneTimePaymentRequest,
    ) -> Result<PaymentLink, PaymentError>;
}

pub struct HttpWalletGateway {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpWalletGateway {
    pub fn new(endpoint: String) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| PaymentError::Transport(err.to_string()))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl PaymentGateway for HttpWalletGateway {
    async fn create_payment_link(
        &self,
        request: &OneTimePaymentRequest,
    ) -> Result<PaymentLink, PaymentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| PaymentError::Transport(err.to_string()))?;

        let body: CreateLinkResponse = response
            .json()
            .await
            .map_err(|err| PaymentError::Transport(err.to_string()))?;

        if body.result_code != RESULT_CODE_SUCCESS {
            return Err(PaymentError::Provider {
                result_code: body.result_code,
                message: body.message,
            });
        }

        let pay_url = body.pay_url.ok_or_else(|| PaymentError::Provider {
            result_code: body.result_code,
            message: "success response without payUrl".to_string(),
        })?;

        Ok(PaymentLink {
            pay_url,
            deeplink: body.deeplink,
        })
    }
}
