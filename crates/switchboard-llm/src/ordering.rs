//! Mapping vendor result positions back into the caller's index space
//!
//! Vendors receive texts as a plain list in ascending index order and may
//! answer in any order. Results are keyed by their position in that list;
//! these helpers translate positions back to the caller's indices and sort
//! the output so element `i` always belongs to input `i`.

use switchboard_core::{Embedding, IndexedContent, Reranking};

use crate::error::LlmError;

/// Texts in the order they are sent to the vendor
pub fn ordered_texts(content: &IndexedContent) -> Vec<String> {
    content.values().cloned().collect()
}

/// Rebuild embeddings from `(position, vector)` pairs
///
/// Every input must receive exactly one vector.
pub fn restore_embeddings(
    content: &IndexedContent,
    results: impl IntoIterator<Item = (usize, Vec<f64>)>,
) -> Result<Vec<Embedding>, LlmError> {
    let keys: Vec<u32> = content.keys().copied().collect();
    let mut slots: Vec<Option<Vec<f64>>> = vec![None; keys.len()];

    for (position, vector) in results {
        let slot = slots
            .get_mut(position)
            .ok_or_else(|| LlmError::transport(format!("vendor returned embedding for unknown position {position}")))?;
        *slot = Some(vector);
    }

    keys.into_iter()
        .zip(slots)
        .map(|(index, slot)| {
            slot.map(|embedding| Embedding { index, embedding })
                .ok_or_else(|| LlmError::transport(format!("vendor returned no embedding for input {index}")))
        })
        .collect()
}

/// Rebuild rerankings from `(position, relevance)` pairs, sorted by index
///
/// Vendors may return only the top documents; missing ones are omitted.
pub fn restore_rerankings(
    documents: &IndexedContent,
    results: impl IntoIterator<Item = (usize, f64)>,
) -> Result<Vec<Reranking>, LlmError> {
    let entries: Vec<(&u32, &String)> = documents.iter().collect();

    let mut rerankings = results
        .into_iter()
        .map(|(position, relevance_score)| {
            let (index, content) = entries
                .get(position)
                .ok_or_else(|| LlmError::transport(format!("vendor ranked unknown document position {position}")))?;
            Ok(Reranking {
                index: **index,
                relevance_score,
                content: (*content).clone(),
            })
        })
        .collect::<Result<Vec<_>, LlmError>>()?;

    rerankings.sort_by_key(|r| r.index);
    Ok(rerankings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(texts: &[(u32, &str)]) -> IndexedContent {
        texts.iter().map(|(i, t)| (*i, (*t).to_owned())).collect()
    }

    #[test]
    fn embeddings_follow_caller_indices() {
        let input = content(&[(0, "a"), (1, "b"), (2, "c")]);
        let vendor = vec![(2, vec![2.0]), (0, vec![0.0]), (1, vec![1.0])];

        let embeddings = restore_embeddings(&input, vendor).unwrap();
        let pairs: Vec<_> = embeddings.iter().map(|e| (e.index, e.embedding[0])).collect();
        assert_eq!(pairs, vec![(0, 0.0), (1, 1.0), (2, 2.0)]);
    }

    #[test]
    fn sparse_caller_indices_are_preserved() {
        let input = content(&[(3, "x"), (10, "y")]);
        let embeddings = restore_embeddings(&input, vec![(1, vec![1.0]), (0, vec![0.5])]).unwrap();
        assert_eq!(embeddings[0].index, 3);
        assert_eq!(embeddings[0].embedding, vec![0.5]);
        assert_eq!(embeddings[1].index, 10);
    }

    #[test]
    fn missing_embedding_is_an_error() {
        let input = content(&[(0, "a"), (1, "b")]);
        assert!(restore_embeddings(&input, vec![(0, vec![0.0])]).is_err());
        assert!(restore_embeddings(&input, vec![(0, vec![0.0]), (5, vec![1.0])]).is_err());
    }

    #[test]
    fn rerankings_follow_caller_indices() {
        let docs = content(&[(0, "a"), (1, "b"), (2, "c")]);
        let vendor = vec![(2, 0.9), (0, 0.5), (1, 0.1)];

        let rerankings = restore_rerankings(&docs, vendor).unwrap();
        let pairs: Vec<_> = rerankings
            .iter()
            .map(|r| (r.index, r.content.as_str()))
            .collect();
        assert_eq!(pairs, vec![(0, "a"), (1, "b"), (2, "c")]);
        assert!((rerankings[2].relevance_score - 0.9).abs() < f64::EPSILON);
    }
}
