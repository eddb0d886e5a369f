use serde::Deserialize;

/// Current alert as shown to recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertContent {
    pub display_text: String,
    pub media_locator: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BoostableBossesResponse {
    pub boostable_bosses: Option<BoostableBosses>,
}

#[derive(Debug, Deserialize)]
pub struct BoostableBosses {
    pub boosted: Option<BoostedBoss>,
}

#[derive(Debug, Deserialize)]
pub struct BoostedBoss {
    pub name: String,

    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<BoostedBoss> for AlertContent {
    fn from(boss: BoostedBoss) -> Self {
        Self {
            display_text: format!("Boosted boss: {}", boss.name),
            media_locator: boss.image_url.filter(|url| !url.is_empty()),
        }
    }
}
