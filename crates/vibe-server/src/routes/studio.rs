//! Generation and critique endpoints
//!
//! Remix and roast count against the free plan's monthly limit for
//! identified callers.

use super::{credential, json, json_body, with_state};
use crate::error::{finish, ApiError};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::Filter;
use vibe_genai::InlineImage;

/// `POST /api/generate/from-text`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextRequest {
    pub prompt: String,
    pub style: Option<String>,
}

/// `POST /api/generate/from-image`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRequest {
    /// Base64 data or a `data:` URL
    pub image: String,
    pub mime_type: String,
    pub prompt: Option<String>,
    pub style: Option<String>,
}

/// `POST /api/remix`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemixRequest {
    pub html: String,
    pub instruction: String,
}

/// `POST /api/copy`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CopyRequest {
    pub text: String,
    pub instruction: Option<String>,
}

/// Screenshot analyses
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisRequest {
    pub image: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
struct HtmlReply {
    html: String,
}

#[derive(Debug, Serialize)]
struct TextReply {
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analysis {
    Roast,
    VibeScore,
    Heatmap,
    BrandMatch,
}

impl Analysis {
    const fn path(self) -> &'static str {
        match self {
            Self::Roast => "roast",
            Self::VibeScore => "vibe-score",
            Self::Heatmap => "heatmap",
            Self::BrandMatch => "brand-match",
        }
    }

    const fn is_metered(self) -> bool {
        matches!(self, Self::Roast)
    }
}

pub(crate) fn routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let limit = state.body_limit;

    let text_route = warp::path!("api" / "generate" / "from-text")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<TextRequest>(limit))
        .and_then(|state, credential, body| async move { finish(from_text(state, credential, body).await) });

    let image_route = warp::path!("api" / "generate" / "from-image")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<ImageRequest>(limit))
        .and_then(|state, credential, body| async move { finish(from_image(state, credential, body).await) });

    let remix_route = warp::path!("api" / "remix")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<RemixRequest>(limit))
        .and_then(|state, credential, body| async move { finish(remix(state, credential, body).await) });

    let copy_route = warp::path!("api" / "copy")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<CopyRequest>(limit))
        .and_then(|state, credential, body| async move { finish(copy(state, credential, body).await) });

    text_route
        .or(image_route)
        .unify()
        .or(remix_route)
        .unify()
        .or(copy_route)
        .unify()
        .or(analysis(state, Analysis::Roast))
        .unify()
        .or(analysis(state, Analysis::VibeScore))
        .unify()
        .or(analysis(state, Analysis::Heatmap))
        .unify()
        .or(analysis(state, Analysis::BrandMatch))
        .unify()
        .boxed()
}

fn analysis(state: &AppState, kind: Analysis) -> BoxedFilter<(Response,)> {
    warp::path("api")
        .and(warp::path(kind.path()))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(credential())
        .and(json_body::<AnalysisRequest>(state.body_limit))
        .and_then(move |state, credential, body| async move { finish(analyse(state, credential, kind, body).await) })
        .boxed()
}

async fn from_text(state: AppState, credential: Option<String>, body: TextRequest) -> Result<Response, ApiError> {
    state.caller(credential.as_deref()).await?;
    let page = state
        .critic
        .generate_page(Some(&body.prompt), None, body.style.as_deref())
        .await?;
    Ok(json(&page))
}

async fn from_image(state: AppState, credential: Option<String>, body: ImageRequest) -> Result<Response, ApiError> {
    state.caller(credential.as_deref()).await?;
    let image = inline_image(body.image, body.mime_type)?;
    let page = state
        .critic
        .generate_page(body.prompt.as_deref(), Some(image), body.style.as_deref())
        .await?;
    Ok(json(&page))
}

async fn remix(state: AppState, credential: Option<String>, body: RemixRequest) -> Result<Response, ApiError> {
    let caller = state.caller(credential.as_deref()).await?;
    state.check_usage(caller.as_ref()).await?;
    let html = state.critic.remix_fragment(&body.html, &body.instruction).await?;
    Ok(json(&HtmlReply { html }))
}

async fn copy(state: AppState, credential: Option<String>, body: CopyRequest) -> Result<Response, ApiError> {
    state.caller(credential.as_deref()).await?;
    let text = state.critic.polish_text(&body.text, body.instruction.as_deref()).await?;
    Ok(json(&TextReply { text }))
}

async fn analyse(
    state: AppState,
    credential: Option<String>,
    kind: Analysis,
    body: AnalysisRequest,
) -> Result<Response, ApiError> {
    let caller = state.caller(credential.as_deref()).await?;
    if kind.is_metered() {
        state.check_usage(caller.as_ref()).await?;
    }
    let image = inline_image(body.image, body.mime_type)?;
    let critic = &state.critic;
    Ok(match kind {
        Analysis::Roast => json(&critic.roast(image).await?),
        Analysis::VibeScore => json(&critic.vibe_score(image).await?),
        Analysis::Heatmap => json(&critic.heatmap(image).await?),
        Analysis::BrandMatch => json(&critic.brand_match(image).await?),
    })
}

/// Accept raw base64 or a `data:<mime>;base64,` URL
fn inline_image(image: String, mime_type: String) -> Result<InlineImage, ApiError> {
    if image.trim().is_empty() {
        return Err(ApiError::BadRequest("Image is required".to_owned()));
    }
    let Some(rest) = image.strip_prefix("data:") else {
        return Ok(InlineImage::new(mime_type, image));
    };
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ApiError::BadRequest("Malformed data URL".to_owned()))?;
    let declared = header
        .strip_suffix(";base64")
        .ok_or_else(|| ApiError::BadRequest("Data URL must be base64-encoded".to_owned()))?;
    let mime_type = if mime_type.trim().is_empty() { declared.to_owned() } else { mime_type };
    Ok(InlineImage::new(mime_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn data_urls_carry_their_mime_type() {
        let image = inline_image("data:image/jpeg;base64,AAAA".into(), String::new()).unwrap();
        assert_eq!(image, InlineImage::new("image/jpeg", "AAAA"));

        let explicit = inline_image("data:image/jpeg;base64,AAAA".into(), "image/png".into()).unwrap();
        assert_eq!(explicit.mime_type, "image/png");

        let raw = inline_image("AAAA".into(), "image/webp".into()).unwrap();
        assert_eq!(raw, InlineImage::new("image/webp", "AAAA"));
    }

    #[test]
    fn malformed_images_are_rejected() {
        assert!(inline_image("  ".into(), "image/png".into()).is_err());
        assert!(inline_image("data:image/png;base64".into(), String::new()).is_err());
        assert!(inline_image("data:text/plain,hello".into(), String::new()).is_err());
    }

    #[test]
    fn only_roast_is_metered() {
        let metered: Vec<_> = [Analysis::Roast, Analysis::VibeScore, Analysis::Heatmap, Analysis::BrandMatch]
            .into_iter()
            .filter(|kind| kind.is_metered())
            .map(Analysis::path)
            .collect();
        assert_eq!(metered, vec!["roast"]);
    }
}
