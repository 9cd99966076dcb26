//! 分类与标签镜像

use std::sync::Arc;

use tracing::debug;

use crate::error::RelayResult;
use crate::model::ItemId;
use crate::store::{ContentItem, ContentStore, Taxonomy};

#[derive(Clone)]
pub struct TaxonomyManager {
    store: Arc<dyn ContentStore>,
}

impl TaxonomyManager {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// 把原文的分类项映射到目标语言后设置到译文上，没有对应项的跳过
    ///
    /// 返回设置的分类项总数
    pub async fn mirror(
        &self,
        item_id: ItemId,
        language: &str,
        original: Option<&ContentItem>,
    ) -> RelayResult<usize> {
        let Some(original) = original else {
            return Ok(0);
        };

        let mut mirrored = 0;
        for taxonomy in Taxonomy::ALL {
            let Some(terms) = original.terms.get(&taxonomy) else {
                continue;
            };

            let mut mapped = Vec::with_capacity(terms.len());
            for &term in terms {
                match self.store.translated_term(taxonomy, term, language).await? {
                    Some(translated) => mapped.push(translated),
                    None => debug!("{} {} 没有 {} 对应项，跳过", taxonomy, term, language),
                }
            }

            if !mapped.is_empty() {
                self.store.set_terms(item_id, taxonomy, &mapped).await?;
                mirrored += mapped.len();
            }
        }

        Ok(mirrored)
    }
}
