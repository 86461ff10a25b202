use studypilot_schema::{MemoryChunk, MemoryQuality};

pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MAX_CONTEXT_CHUNKS: usize = 5;

/// Chunks that cleared the gate, plus the quality grade of the whole retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct GatedMemory {
    pub strong: Vec<MemoryChunk>,
    pub quality: MemoryQuality,
    /// Chunks the retriever returned before gating.
    pub retrieved: usize,
}

impl GatedMemory {
    pub fn empty() -> Self {
        Self {
            strong: Vec::new(),
            quality: MemoryQuality::None,
            retrieved: 0,
        }
    }

    /// True when retrieval found anything at all, weak matches included.
    pub fn was_used(&self) -> bool {
        self.retrieved > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceGate {
    pub threshold: f32,
    pub max_count: usize,
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
            max_count: DEFAULT_MAX_CONTEXT_CHUNKS,
        }
    }
}

impl RelevanceGate {
    pub fn new(threshold: f32, max_count: usize) -> Self {
        Self {
            threshold,
            max_count,
        }
    }

    /// Keeps chunks scoring at least the threshold, in input order, capped at `max_count`.
    pub fn filter(&self, chunks: Vec<MemoryChunk>) -> GatedMemory {
        if chunks.is_empty() {
            return GatedMemory::empty();
        }

        let retrieved = chunks.len();
        let strong: Vec<MemoryChunk> = chunks
            .into_iter()
            .filter(|c| c.score >= self.threshold)
            .take(self.max_count)
            .collect();

        let quality = if strong.is_empty() {
            MemoryQuality::Weak
        } else {
            MemoryQuality::Strong
        };

        GatedMemory {
            strong,
            quality,
            retrieved,
        }
    }
}
