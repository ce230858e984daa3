use crate::{CityTagError, CityTagResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CityTagConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl CityTagConfig {
    pub fn validate(&self) -> CityTagResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(CityTagError::InvalidConfig("CITYTAG_BASE_URL must be set"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(CityTagError::InvalidConfig("user_agent must be set"));
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::CityTagConfig;

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        let config = CityTagConfig {
            base_url: "http://provider.example/".to_owned(),
            user_agent: "tagtrail/0.1".to_owned(),
        };
        assert_eq!(
            config.endpoint("/api/interface/login"),
            "http://provider.example/api/interface/login"
        );
    }

    #[test]
    fn empty_base_url_fails_validation() {
        let config = CityTagConfig {
            base_url: "  ".to_owned(),
            user_agent: "tagtrail/0.1".to_owned(),
        };
        assert!(config.validate().is_err());
    }
}
