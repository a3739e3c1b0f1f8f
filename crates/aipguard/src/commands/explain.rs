use super::Session;
use aipguard_guidance::GuidanceCache;

/// Print the condensed documentation for one rule.
#[allow(clippy::print_stdout)]
pub async fn execute(session: &Session, uri: &str) -> miette::Result<()> {
    let mut cache = GuidanceCache::new(session.http.clone())?;
    let guidance = cache.guidance_for(uri).await;
    println!("{}", guidance.formatted_body);
    Ok(())
}
