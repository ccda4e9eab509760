#![allow(dead_code)]

use rust_pgn::data::{Batch, EncodedExample, MaxLengths, SummarizationDataset, Vocab};
use rust_pgn::pgn::{
    DecoderInput, DecoderOutput, EncoderOutput, ParameterGroups, PointerGeneratorModel,
};
use rust_pgn::PgnError;
use tch::nn::Module;
use tch::{nn, Device, Kind, Tensor};

pub const TOKENS: [&str; 9] = [
    "<PAD>", "<START>", "<STOP>", "<UNK>", "the", "cat", "sat", "on", "mat",
];

pub fn toy_vocab() -> Vocab {
    Vocab::from_tokens(TOKENS.iter().copied()).unwrap()
}

pub fn toy_examples() -> (Vec<Vec<String>>, Vec<Vec<String>>) {
    let sources = [
        "the cat sat on the mat",
        "the dog sat on the rug",
        "a cat on the mat",
        "the cat sat",
        "the bird sat on the cat",
        "the mat sat on the cat",
        "the cat sat on the sofa",
        "on the mat the cat sat",
    ];
    let targets = [
        "cat sat", "dog sat", "cat mat", "cat sat", "bird sat", "mat sat", "cat sofa", "cat mat",
    ];
    let split = |lines: &[&str]| -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|line| line.split_whitespace().map(String::from).collect())
            .collect()
    };
    (split(&sources), split(&targets))
}

pub fn toy_dataset(vocab: &Vocab, batch_size: usize) -> SummarizationDataset {
    let (sources, targets) = toy_examples();
    SummarizationDataset::from_examples(
        vocab,
        &sources,
        &targets,
        MaxLengths {
            encoder: 8,
            decoder: 5,
        },
        batch_size,
        Device::Cpu,
    )
    .unwrap()
}

pub fn encoded(vocab: &Vocab, source: &str, target: &str) -> EncodedExample {
    let source: Vec<&str> = source.split_whitespace().collect();
    let target: Vec<&str> = target.split_whitespace().collect();
    EncodedExample::new(
        vocab,
        &source,
        &target,
        MaxLengths {
            encoder: 8,
            decoder: 5,
        },
    )
    .unwrap()
}

/// Small pointer-generator with a linear encoder, additive attention with coverage, a single layer
/// decoder and a copy switch. Its variables live under the `encoder`, `attention`, `decoder` and
/// `pointer` paths; the embedding is kept out of the groups and frozen.
pub struct ToyPointerGenerator {
    pub var_store: nn::VarStore,
    vocab_size: i64,
    unknown_id: i64,
    embedding: nn::Embedding,
    encoder: nn::Linear,
    attention_features: nn::Linear,
    attention_query: nn::Linear,
    attention_coverage: nn::Linear,
    attention_score: nn::Linear,
    decoder: nn::Linear,
    output: nn::Linear,
    pointer: nn::Linear,
}

impl ToyPointerGenerator {
    pub fn new(vocab: &Vocab, hidden_size: i64) -> ToyPointerGenerator {
        tch::manual_seed(42);
        let var_store = nn::VarStore::new(Device::Cpu);
        let root = var_store.root();
        let vocab_size = vocab.size();
        let embedding_size = 6;
        let embedding = nn::embedding(
            &root / "embedding",
            vocab_size,
            embedding_size,
            Default::default(),
        );
        let _ = tch::no_grad(|| embedding.ws.set_requires_grad(false));

        let encoder = nn::linear(
            &root / "encoder" / "projection",
            embedding_size,
            hidden_size,
            Default::default(),
        );
        let attention = &root / "attention";
        let attention_features = nn::linear(
            &attention / "features",
            hidden_size,
            hidden_size,
            Default::default(),
        );
        let attention_query = nn::linear(
            &attention / "query",
            hidden_size,
            hidden_size,
            Default::default(),
        );
        let attention_coverage =
            nn::linear(&attention / "coverage", 1, hidden_size, Default::default());
        let attention_score = nn::linear(
            &attention / "score",
            hidden_size,
            1,
            nn::LinearConfig {
                bias: false,
                ..Default::default()
            },
        );
        let decoder = nn::linear(
            &root / "decoder" / "cell",
            embedding_size + hidden_size,
            hidden_size,
            Default::default(),
        );
        let output = nn::linear(
            &root / "decoder" / "output",
            2 * hidden_size,
            vocab_size,
            Default::default(),
        );
        let pointer = nn::linear(
            &root / "pointer" / "switch",
            2 * hidden_size,
            1,
            Default::default(),
        );

        ToyPointerGenerator {
            var_store,
            vocab_size,
            unknown_id: vocab.required_id("<UNK>").unwrap(),
            embedding,
            encoder,
            attention_features,
            attention_query,
            attention_coverage,
            attention_score,
            decoder,
            output,
            pointer,
        }
    }

    /// Copies of all variables, including the frozen embedding.
    pub fn snapshot(&self) -> Vec<(String, Tensor)> {
        let mut variables: Vec<(String, Tensor)> = self
            .var_store
            .variables()
            .into_iter()
            .map(|(name, tensor)| (name, tensor.detach().copy()))
            .collect();
        variables.sort_by(|a, b| a.0.cmp(&b.0));
        variables
    }
}

impl PointerGeneratorModel for ToyPointerGenerator {
    fn encode(&self, encoder_input_ids: &Tensor, _train: bool) -> Result<EncoderOutput, PgnError> {
        let encoder_outputs = self
            .encoder
            .forward(&self.embedding.forward(encoder_input_ids))
            .tanh();
        let hidden_state = encoder_outputs.mean_dim([1].as_slice(), false, Kind::Float);
        Ok(EncoderOutput {
            encoder_outputs,
            hidden_state,
        })
    }

    fn decode(
        &self,
        input: &DecoderInput,
        encoder_output: &EncoderOutput,
        use_coverage: bool,
        prev_coverage: Option<&Tensor>,
        _train: bool,
    ) -> Result<DecoderOutput, PgnError> {
        let (batch_size, target_length) = input.decoder_targets.size2()?;
        let encoder_outputs = &encoder_output.encoder_outputs;
        let encoder_mask = input.encoder_mask.to_kind(Kind::Float);
        let encoder_features = self.attention_features.forward(encoder_outputs);
        let max_oov = input.oov_counts.max().int64_value(&[]);
        let mut coverage = match prev_coverage {
            Some(coverage) => coverage.shallow_clone(),
            None => encoder_mask.zeros_like(),
        };
        let mut hidden = encoder_output.hidden_state.shallow_clone();
        let mut context = hidden.zeros_like();

        let mut final_distributions = Vec::with_capacity(target_length as usize);
        let mut attentions = Vec::with_capacity(target_length as usize);
        let mut coverages = Vec::with_capacity(target_length as usize);
        for step in 0..target_length {
            let mut features =
                &encoder_features + self.attention_query.forward(&hidden).unsqueeze(1);
            if use_coverage {
                features = features + self.attention_coverage.forward(&coverage.unsqueeze(-1));
            }
            let scores = self
                .attention_score
                .forward(&features.tanh())
                .squeeze_dim(-1);
            let attention = scores.softmax(-1, Kind::Float) * &encoder_mask;
            let attention = &attention / attention.sum_dim_intlist([1].as_slice(), true, Kind::Float);
            context = (attention.unsqueeze(-1) * encoder_outputs).sum_dim_intlist(
                [1].as_slice(),
                false,
                Kind::Float,
            );

            let token = input.decoder_targets.select(1, step);
            let token = token.where_self(&token.lt(self.vocab_size), &token.full_like(self.unknown_id));
            let decoder_input = Tensor::cat(&[self.embedding.forward(&token), context.shallow_clone()], -1);
            hidden = self.decoder.forward(&decoder_input).tanh();

            let state = Tensor::cat(&[&hidden, &context], -1);
            let vocab_distribution = self.output.forward(&state).softmax(-1, Kind::Float);
            let generation_probability = self.pointer.forward(&state).sigmoid();
            let extended_distribution = Tensor::cat(
                &[
                    vocab_distribution * &generation_probability,
                    Tensor::zeros([batch_size, max_oov], (Kind::Float, Device::Cpu)),
                ],
                1,
            );
            let copy_distribution = &attention * (1.0 - &generation_probability);
            let final_distribution = extended_distribution.f_scatter_add(
                1,
                input.encoder_extended_ids,
                &copy_distribution,
            )?;

            coverage = &coverage + &attention;
            final_distributions.push(final_distribution);
            attentions.push(attention.unsqueeze(-1));
            coverages.push(coverage.unsqueeze(-1));
        }

        Ok(DecoderOutput {
            final_distributions,
            attentions,
            coverages,
            decoder_hidden: Some(hidden),
            context_vector: Some(context),
            last_coverage: Some(coverage),
        })
    }

    fn parameter_groups(&self) -> ParameterGroups {
        ParameterGroups::from_var_store(&self.var_store)
    }
}

/// Model double replaying fixed decoder outputs, for checking the loop bookkeeping.
pub struct ScriptedModel {
    pub final_distributions: Vec<Tensor>,
    pub attentions: Vec<Tensor>,
}

impl ScriptedModel {
    /// Builds one-hot distributions over `extended_size` ids from `[batch, steps]` predicted ids,
    /// with uniform attention over `source_length` positions.
    pub fn from_predictions(
        predicted_ids: &[Vec<i64>],
        extended_size: i64,
        source_length: i64,
    ) -> ScriptedModel {
        let batch_size = predicted_ids.len() as i64;
        let steps = predicted_ids[0].len();
        let final_distributions = (0..steps)
            .map(|step| {
                let ids: Vec<i64> = predicted_ids.iter().map(|ids| ids[step]).collect();
                Tensor::from_slice(&ids)
                    .one_hot(extended_size)
                    .to_kind(Kind::Float)
                    .clamp(0.01, 0.99)
            })
            .collect();
        let attentions = (0..steps)
            .map(|_| {
                Tensor::full(
                    [batch_size, source_length, 1],
                    1.0 / source_length as f64,
                    (Kind::Float, Device::Cpu),
                )
            })
            .collect();
        ScriptedModel {
            final_distributions,
            attentions,
        }
    }
}

impl PointerGeneratorModel for ScriptedModel {
    fn encode(&self, encoder_input_ids: &Tensor, _train: bool) -> Result<EncoderOutput, PgnError> {
        let (batch_size, source_length) = encoder_input_ids.size2()?;
        Ok(EncoderOutput {
            encoder_outputs: Tensor::zeros([batch_size, source_length, 1], (Kind::Float, Device::Cpu)),
            hidden_state: Tensor::zeros([batch_size, 1], (Kind::Float, Device::Cpu)),
        })
    }

    fn decode(
        &self,
        _input: &DecoderInput,
        _encoder_output: &EncoderOutput,
        _use_coverage: bool,
        _prev_coverage: Option<&Tensor>,
        _train: bool,
    ) -> Result<DecoderOutput, PgnError> {
        let (coverages, _) = self.attentions.iter().fold(
            (Vec::new(), self.attentions[0].zeros_like()),
            |(mut coverages, coverage), attention| {
                let coverage = coverage + attention;
                coverages.push(coverage.shallow_clone());
                (coverages, coverage)
            },
        );
        Ok(DecoderOutput {
            final_distributions: self
                .final_distributions
                .iter()
                .map(Tensor::shallow_clone)
                .collect(),
            attentions: self.attentions.iter().map(Tensor::shallow_clone).collect(),
            coverages,
            decoder_hidden: None,
            context_vector: None,
            last_coverage: None,
        })
    }

    fn parameter_groups(&self) -> ParameterGroups {
        ParameterGroups::default()
    }
}

/// Builds a batch directly from id rows, with full masks.
pub fn batch_from_ids(source_ids: &[Vec<i64>], target_ids: &[Vec<i64>], oov_counts: &[i64]) -> Batch {
    let rows = |values: &[Vec<i64>]| {
        let width = values[0].len() as i64;
        let flat: Vec<i64> = values.iter().flatten().copied().collect();
        Tensor::from_slice(&flat).view([values.len() as i64, width])
    };
    let encoder_input_ids = rows(source_ids);
    let decoder_targets = rows(target_ids);
    Batch {
        encoder_extended_ids: encoder_input_ids.copy(),
        encoder_mask: encoder_input_ids.ones_like(),
        encoder_input_ids,
        oov_counts: Tensor::from_slice(oov_counts),
        decoder_mask: decoder_targets.ones_like(),
        decoder_targets,
    }
}
