// paginate.rs
// Shared skip/limit pagination over a filtered, sorted collection query.

use anyhow::Result;
use futures::stream::TryStreamExt;
use mongodb::{Collection, bson::Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_index: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

pub async fn find_page<T>(
    coll: &Collection<T>,
    filter: Document,
    sort: Document,
    page_index: u64,
    page_size: u64,
) -> Result<Paginated<T>>
where
    T: DeserializeOwned + Serialize + Send + Sync,
{
    let page_index = page_index.max(1);
    let total_count = coll.count_documents(filter.clone()).await?;
    let total_pages = total_count.div_ceil(page_size);

    let mut cursor = coll
        .find(filter)
        .sort(sort)
        .skip((page_index - 1) * page_size)
        .limit(page_size as i64)
        .await?;
    let mut items = Vec::new();
    while let Some(item) = cursor.try_next().await? {
        items.push(item);
    }

    Ok(Paginated {
        items,
        page_index,
        page_size,
        total_count,
        total_pages,
        has_previous_page: page_index > 1,
        has_next_page: page_index < total_pages,
    })
}
