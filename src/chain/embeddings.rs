use std::env;

use serde::{Deserialize, Serialize};

use crate::chain::chat_runtime::{RequestFailure, RetryConfig, send_json_with_retry};
use crate::chain::provider::{
    DEFAULT_RETRY_DELAY_MS, Provider, ProviderError, api_key_env, endpoint,
};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f64>,
}

/// OpenAI-compatible embeddings client.
#[derive(Debug, Clone)]
pub struct EmbeddingsClient {
    provider: Provider,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl EmbeddingsClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: endpoint(provider).to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Embeds a single query string and returns the dense vector.
    pub async fn embed_query(&self, input: impl Into<String>) -> Result<Vec<f64>, ProviderError> {
        let mut vectors = self.embed(&[input.into()]).await?;
        vectors.pop().ok_or(ProviderError::EmptyResponse {
            provider: self.provider,
        })
    }

    /// Embeds every input, returning vectors in input order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>, ProviderError> {
        let provider = self.provider;
        let api_key = match api_key_env(provider) {
            Some(key_env) => Some(
                env::var(key_env)
                    .map_err(|_| ProviderError::MissingApiKey { provider, key_env })?,
            ),
            None => None,
        };
        let url = match provider {
            Provider::Ollama => format!("{}/v1/embeddings", self.base_url),
            _ => format!("{}/embeddings", self.base_url),
        };
        let payload = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let response = send_json_with_retry(
            &self.client,
            &url,
            api_key.as_deref(),
            &payload,
            RetryConfig {
                timeout_secs: None,
                retries: 0,
                retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            },
        )
        .await
        .map_err(|failure| match failure {
            RequestFailure::Request(source) => ProviderError::Request { provider, source },
            RequestFailure::Api { status, body } => ProviderError::Api {
                provider,
                status,
                body,
            },
        })?;

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|source| ProviderError::Request { provider, source })?;
        if body.data.len() != inputs.len() {
            return Err(ProviderError::EmptyResponse { provider });
        }
        body.data.sort_by_key(|item| item.index);
        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }
}

pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; zero-magnitude vectors score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let magnitude_a = a.iter().map(|x| x.powi(2)).sum::<f64>().sqrt();
    let magnitude_b = b.iter().map(|x| x.powi(2)).sum::<f64>().sqrt();
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }
    dot_product(a, b) / (magnitude_a * magnitude_b)
}

/// Returns `(index, score)` of the `k` candidates most similar to `query`, best first.
pub fn top_k(query: &[f64], candidates: &[Vec<f64>], k: usize) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| (index, cosine_similarity(query, candidate)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored
}

/// Embeds `chunks` and the query, returning the `k` chunks closest to the query.
pub async fn most_similar_chunks<'a>(
    client: &EmbeddingsClient,
    query: &str,
    chunks: &'a [String],
    k: usize,
) -> Result<Vec<&'a str>, ProviderError> {
    if chunks.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let query_vector = client.embed_query(query).await?;
    let chunk_vectors = client.embed(chunks).await?;
    Ok(top_k(&query_vector, &chunk_vectors, k)
        .into_iter()
        .map(|(index, _)| chunks[index].as_str())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let score = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 5.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn top_k_orders_best_first() {
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![1.0, 1.0]];
        let ranked = top_k(&[1.0, 0.0], &candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 2);
    }

    #[test]
    fn top_k_with_large_k_returns_everything() {
        let candidates = vec![vec![1.0], vec![-1.0]];
        assert_eq!(top_k(&[1.0], &candidates, 10).len(), 2);
    }
}
