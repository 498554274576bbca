//! Per-brand copy, loaded once at startup and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{FormError, Result};
use crate::protocol::Flow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandCopy {
    pub display_name: String,
    pub quote_success: String,
    pub claim_success: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_url: Option<String>,
}

impl BrandCopy {
    pub fn success_text(&self, flow: Flow) -> &str {
        match flow {
            Flow::Quote => &self.quote_success,
            Flow::Claim => &self.claim_success,
        }
    }
}

impl Default for BrandCopy {
    fn default() -> Self {
        Self {
            display_name: "Insurance Broker".to_string(),
            quote_success: "Your quote request was received. An advisor will contact you shortly."
                .to_string(),
            claim_success: "Your claim was filed. We will keep you updated on its progress."
                .to_string(),
            terms_url: None,
        }
    }
}

/// Brand copy keyed by brand code, with a fallback for unknown codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandCatalog {
    #[serde(default)]
    pub default: BrandCopy,
    #[serde(default)]
    pub brands: HashMap<String, BrandCopy>,
}

impl BrandCatalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| FormError::BrandCatalog(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| FormError::BrandCatalog(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn with_brand(mut self, code: impl Into<String>, copy: BrandCopy) -> Self {
        self.brands.insert(code.into(), copy);
        self
    }

    pub fn resolve(&self, code: &str) -> &BrandCopy {
        self.brands.get(code).unwrap_or(&self.default)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.brands.contains_key(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
default:
  display_name: Broker
  quote_success: Quote received
  claim_success: Claim received
brands:
  LPC001:
    display_name: La Positiva
    quote_success: Gracias, recibimos tu solicitud
    claim_success: Tu reclamo fue registrado
    terms_url: https://example.com/terms
"#;

    #[test]
    fn resolves_known_and_unknown_brands() {
        let catalog = BrandCatalog::from_yaml_str(CATALOG).unwrap();

        let known = catalog.resolve("LPC001");
        assert_eq!(known.display_name, "La Positiva");
        assert_eq!(known.success_text(Flow::Claim), "Tu reclamo fue registrado");

        let unknown = catalog.resolve("XYZ");
        assert_eq!(unknown.display_name, "Broker");
        assert_eq!(unknown.success_text(Flow::Quote), "Quote received");
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = BrandCatalog::from_yaml_str("brands: [1, 2").unwrap_err();
        assert!(matches!(err, FormError::BrandCatalog(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = BrandCatalog::load("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
