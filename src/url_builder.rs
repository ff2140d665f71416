use url::Url;

use crate::error::Result;

/// Parse the archive base URL, making sure relative joins keep its path.
pub fn base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `{base}/resources/{dataset}`: where a new request is submitted.
pub fn resource_url(base: &Url, dataset: &str) -> Result<Url> {
    Ok(base.join("resources/")?.join(dataset)?)
}

/// `{base}/tasks/{request_id}`: polled for state, deleted once downloaded.
pub fn task_url(base: &Url, request_id: &str) -> Result<Url> {
    Ok(base.join("tasks/")?.join(request_id)?)
}

/// Download locations may be absolute or relative to the archive.
pub fn location_url(base: &Url, location: &str) -> Result<Url> {
    Ok(base.join(location)?)
}
