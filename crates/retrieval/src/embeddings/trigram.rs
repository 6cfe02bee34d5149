//! Offline embeddings from hashed character n-grams.
//!
//! Not semantic, but deterministic and content-dependent, which is enough
//! for small local indexes and for tests. Korean words are short and carry
//! particles (속초에, 속초의), so character bigrams are hashed alongside
//! trigrams to let word stems match.

use super::EmbeddingProvider;
use pawtrip_core::AppResult;

#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, gram: &str, seed: u64) -> usize {
        let hash = gram
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(37).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let chars: Vec<char> = word.chars().collect();

            embedding[self.bucket(word, 7)] += 1.0;

            for pair in chars.windows(2) {
                let gram: String = pair.iter().collect();
                embedding[self.bucket(&gram, 11)] += 0.5;
            }

            for triple in chars.windows(3) {
                let gram: String = triple.iter().collect();
                embedding[self.bucket(&gram, 13)] += 0.75;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("강아지와 함께 가는 속초 여행").await.unwrap();
        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(128);
        let a = provider.embed("애견 동반 펜션").await.unwrap();
        let b = provider.embed("애견 동반 펜션").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = TrigramProvider::new(32);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_shared_stem_scores_higher() {
        let provider = TrigramProvider::new(384);
        let texts = vec![
            "속초해수욕장 반려견 산책".to_string(),
            "속초해수욕장에서 반려견과 산책하기".to_string(),
            "서울 지하철 이용 규정".to_string(),
        ];
        let v = provider.embed_batch(&texts).await.unwrap();

        let related = cosine_similarity(&v[0], &v[1]);
        let unrelated = cosine_similarity(&v[0], &v[2]);
        assert!(related > unrelated);
    }
}
