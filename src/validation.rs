//! Brazilian tax-id and postal-code checks plus the postal-code lookup client.

use crate::errors::ServiceError;
use crate::models::Address;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use validator::ValidationError;

static POSTAL_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{5}-?[0-9]{3}$").expect("valid regex"));

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn digit_values(digits: &str) -> Vec<u32> {
    digits.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(values: &[u32]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn cpf_is_valid(values: &[u32]) -> bool {
    if values.len() != 11 || all_same(values) {
        return false;
    }
    let check = |len: usize| {
        let sum: u32 = values[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 {
            0
        } else {
            rest
        }
    };
    check(9) == values[9] && check(10) == values[10]
}

fn cnpj_is_valid(values: &[u32]) -> bool {
    const FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

    if values.len() != 14 || all_same(values) {
        return false;
    }
    let check = |weights: &[u32]| {
        let sum: u32 = values.iter().zip(weights).map(|(d, w)| d * w).sum();
        let rest = sum % 11;
        if rest < 2 {
            0
        } else {
            11 - rest
        }
    };
    check(&FIRST) == values[12] && check(&SECOND) == values[13]
}

/// A checked taxpayer id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxId {
    /// Individual, 11 digits
    Cpf(String),
    /// Company, 14 digits
    Cnpj(String),
}

impl TaxId {
    /// Accepts formatted or bare input and verifies the check digits.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let digits = digits_only(raw);
        let values = digit_values(&digits);
        match digits.len() {
            11 if cpf_is_valid(&values) => Ok(TaxId::Cpf(digits)),
            14 if cnpj_is_valid(&values) => Ok(TaxId::Cnpj(digits)),
            11 | 14 => Err(ServiceError::ValidationError(format!(
                "tax id {} has invalid check digits",
                raw
            ))),
            _ => Err(ServiceError::ValidationError(format!(
                "tax id must have 11 (CPF) or 14 (CNPJ) digits, got {}",
                digits.len()
            ))),
        }
    }

    pub fn digits(&self) -> &str {
        match self {
            TaxId::Cpf(d) | TaxId::Cnpj(d) => d,
        }
    }
}

/// Returns the postal code as `NNNNN-NNN`
pub fn normalize_postal_code(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    let digits = digits_only(trimmed);
    if !POSTAL_CODE.is_match(trimmed) || digits.len() != 8 {
        return Err(ServiceError::ValidationError(format!(
            "invalid postal code: {}",
            raw
        )));
    }
    let (head, tail) = digits.split_at(5);
    Ok(format!("{}-{}", head, tail))
}

/// Trims every address field and normalizes the postal code.
pub fn normalize_address(address: Address) -> Result<Address, ServiceError> {
    let tidy = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let postal_code = match tidy(address.postal_code) {
        Some(code) => Some(normalize_postal_code(&code)?),
        None => None,
    };
    Ok(Address {
        street: tidy(address.street),
        number: tidy(address.number),
        complement: tidy(address.complement),
        district: tidy(address.district),
        city: tidy(address.city),
        state: tidy(address.state).map(|s| s.to_uppercase()),
        postal_code,
    })
}

/// `validator` hook for tax id fields; blank means "not informed"
pub fn validate_tax_id(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    TaxId::parse(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("tax_id");
        err.message = Some("Invalid CPF/CNPJ".into());
        err
    })
}

/// `validator` hook for postal code fields; blank means "not informed"
pub fn validate_postal_code(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    normalize_postal_code(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("postal_code");
        err.message = Some("Postal code must look like 00000-000".into());
        err
    })
}

/// Address resolution by postal code
#[async_trait]
pub trait PostalCodeLookup: Send + Sync {
    async fn lookup(&self, postal_code: &str) -> Result<Address, ServiceError>;
}

/// Used when no lookup service is configured
#[derive(Debug, Default)]
pub struct DisabledLookup;

#[async_trait]
impl PostalCodeLookup for DisabledLookup {
    async fn lookup(&self, _postal_code: &str) -> Result<Address, ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "postal code lookup is not configured".into(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    cep: Option<String>,
    logradouro: Option<String>,
    complemento: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// HTTP client for ViaCEP-compatible services: `GET {base}/{digits}/json/`
pub struct ViaCepLookup {
    client: reqwest::Client,
    base_url: String,
}

impl ViaCepLookup {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PostalCodeLookup for ViaCepLookup {
    #[instrument(skip(self))]
    async fn lookup(&self, postal_code: &str) -> Result<Address, ServiceError> {
        let normalized = normalize_postal_code(postal_code)?;
        let url = format!("{}/{}/json/", self.base_url, digits_only(&normalized));
        debug!(%url, "looking up postal code");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("postal code lookup failed: {}", e);
            ServiceError::ExternalServiceError(format!("postal code lookup failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "postal code service returned {}",
                response.status()
            )));
        }

        let body: ViaCepResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("unreadable postal code response: {}", e))
        })?;

        // the service answers 200 with {"erro": true} for unknown codes
        if body.erro.is_some() {
            return Err(ServiceError::NotFound(format!("postal code {}", normalized)));
        }

        Ok(Address {
            street: non_empty(body.logradouro),
            number: None,
            complement: non_empty(body.complemento),
            district: non_empty(body.bairro),
            city: non_empty(body.localidade),
            state: non_empty(body.uf),
            postal_code: non_empty(body.cep).or(Some(normalized)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use test_case::test_case;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test_case("529.982.247-25", true ; "formatted cpf")]
    #[test_case("52998224725", true ; "bare cpf")]
    #[test_case("529.982.247-24", false ; "cpf bad check digit")]
    #[test_case("111.111.111-11", false ; "cpf repeated digits")]
    #[test_case("11.222.333/0001-81", true ; "formatted cnpj")]
    #[test_case("11222333000182", false ; "cnpj bad check digit")]
    #[test_case("00000000000000", false ; "cnpj zeros")]
    #[test_case("123", false ; "too short")]
    fn tax_ids(raw: &str, valid: bool) {
        assert_eq!(TaxId::parse(raw).is_ok(), valid);
        assert_eq!(validate_tax_id(raw).is_ok(), valid);
    }

    #[test_case("١٢٣٤٥٦٧٨" ; "arabic indic digits")]
    #[test_case("12345６７８" ; "fullwidth tail")]
    #[test_case("１２３４５-６７８" ; "fullwidth dashed")]
    #[test_case("01310-10a" ; "letter")]
    fn non_ascii_postal_codes_are_rejected(raw: &str) {
        assert_matches!(normalize_postal_code(raw), Err(ServiceError::ValidationError(_)));
        assert!(validate_postal_code(raw).is_err());
    }

    #[test]
    fn blank_fields_pass_the_hooks() {
        assert!(validate_tax_id("  ").is_ok());
        assert!(validate_postal_code("").is_ok());
        assert!(TaxId::parse("").is_err());
    }

    #[test]
    fn tax_id_kind_follows_length() {
        assert_matches!(TaxId::parse("529.982.247-25"), Ok(TaxId::Cpf(d)) if d == "52998224725");
        assert_matches!(TaxId::parse("11.222.333/0001-81"), Ok(TaxId::Cnpj(_)));
    }

    #[test_case("01001-000", Some("01001-000"))]
    #[test_case("01001000", Some("01001-000"))]
    #[test_case(" 01001-000 ", Some("01001-000"))]
    #[test_case("0100-1000", None)]
    #[test_case("ABCDE-123", None)]
    fn postal_codes(raw: &str, expected: Option<&str>) {
        assert_eq!(normalize_postal_code(raw).ok().as_deref(), expected);
    }

    #[test]
    fn addresses_are_tidied() {
        let address = normalize_address(Address {
            street: Some(" Rua A ".into()),
            state: Some("sp".into()),
            postal_code: Some("01001000".into()),
            number: Some("".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(address.street.as_deref(), Some("Rua A"));
        assert_eq!(address.state.as_deref(), Some("SP"));
        assert_eq!(address.postal_code.as_deref(), Some("01001-000"));
        assert_eq!(address.number, None);

        assert!(normalize_address(Address {
            postal_code: Some("1234".into()),
            ..Default::default()
        })
        .is_err());
    }

    #[tokio::test]
    async fn viacep_lookup_maps_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/01001000/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cep": "01001-000",
                "logradouro": "Praça da Sé",
                "complemento": "lado ímpar",
                "bairro": "Sé",
                "localidade": "São Paulo",
                "uf": "SP"
            })))
            .mount(&server)
            .await;

        let lookup = ViaCepLookup::new(server.uri(), Duration::from_secs(2)).unwrap();
        let address = lookup.lookup("01001-000").await.unwrap();
        assert_eq!(address.city.as_deref(), Some("São Paulo"));
        assert_eq!(address.state.as_deref(), Some("SP"));
        assert_eq!(address.postal_code.as_deref(), Some("01001-000"));
        assert_eq!(address.number, None);
    }

    #[tokio::test]
    async fn viacep_unknown_code_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/99999999/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"erro": true})))
            .mount(&server)
            .await;

        let lookup = ViaCepLookup::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert_matches!(
            lookup.lookup("99999-999").await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn viacep_server_error_is_external() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let lookup = ViaCepLookup::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert_matches!(
            lookup.lookup("01001-000").await,
            Err(ServiceError::ExternalServiceError(_))
        );
    }

    #[tokio::test]
    async fn malformed_code_never_hits_the_network() {
        let lookup = ViaCepLookup::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        assert_matches!(
            lookup.lookup("12").await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
