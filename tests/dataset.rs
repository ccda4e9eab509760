mod common;

use common::{encoded, toy_dataset, toy_examples, toy_vocab};
use rust_pgn::data::{
    batch_start_index, read_tokenized_lines, BatchSource, MaxLengths, SummarizationDataset, Vocab,
};
use rust_pgn::PgnError;
use std::convert::TryFrom;
use std::io::Write;
use tch::Device;

#[test]
fn examples_are_mapped_to_the_extended_vocabulary() {
    let vocab = toy_vocab();

    let example = encoded(&vocab, "the dog sat on the rug", "dog sat");

    assert_eq!(example.oov_words, vec!["dog", "rug"]);
    assert_eq!(example.input_ids, vec![4, 3, 6, 7, 4, 3, 0, 0]);
    assert_eq!(example.extended_ids, vec![4, 9, 6, 7, 4, 10, 0, 0]);
    assert_eq!(example.input_mask, vec![1, 1, 1, 1, 1, 1, 0, 0]);
    assert_eq!(example.target_ids, vec![1, 9, 6, 2, 0]);
    assert_eq!(example.target_mask, vec![1, 1, 1, 1, 0]);
}

#[test]
fn long_sequences_are_truncated_to_their_caps() {
    let vocab = toy_vocab();

    let example = encoded(
        &vocab,
        "the cat sat on the mat on the mat",
        "the cat sat on the mat",
    );

    assert_eq!(example.input_ids.len(), 8);
    assert_eq!(example.input_mask, vec![1; 8]);
    assert_eq!(example.target_ids, vec![1, 4, 5, 6, 2]);
    assert_eq!(example.target_mask, vec![1; 5]);
}

#[test]
fn padded_lines_are_encoded_once() {
    let vocab = toy_vocab();

    let example = encoded(
        &vocab,
        "the dog sat <PAD> <PAD>",
        "<START> dog <STOP> <PAD>",
    );

    assert_eq!(example.oov_words, vec!["dog"]);
    assert_eq!(example.input_ids, vec![4, 3, 6, 0, 0, 0, 0, 0]);
    assert_eq!(example.input_mask, vec![1, 1, 1, 0, 0, 0, 0, 0]);
    assert_eq!(example.target_ids, vec![1, 9, 2, 0, 0]);
    assert_eq!(example.target_mask, vec![1, 1, 1, 0, 0]);
}

#[test]
fn target_words_missing_from_the_source_are_unknown() {
    let vocab = toy_vocab();
    let example = encoded(&vocab, "the cat sat", "dog sat");
    assert!(example.oov_words.is_empty());
    assert_eq!(example.target_ids, vec![1, 3, 6, 2, 0]);
}

#[test]
fn batches_are_padded_tensors() -> anyhow::Result<()> {
    let vocab = toy_vocab();
    let dataset = toy_dataset(&vocab, 3);

    let batch = dataset.get_batch(1)?;

    assert_eq!(dataset.steps_per_epoch(), 2);
    assert_eq!(batch.encoder_input_ids.size(), vec![3, 8]);
    assert_eq!(batch.encoder_extended_ids.size(), vec![3, 8]);
    assert_eq!(batch.encoder_mask.size(), vec![3, 8]);
    assert_eq!(batch.decoder_targets.size(), vec![3, 5]);
    assert_eq!(batch.decoder_mask.size(), vec![3, 5]);
    assert_eq!(batch.batch_size(), 3);
    assert_eq!(batch.decoder_length(), 5);
    //    Examples 3, 4 and 5: "the cat sat", "the bird sat on the cat", "the mat sat on the cat"
    assert_eq!(Vec::<i64>::try_from(&batch.oov_counts)?, vec![0, 1, 0]);
    assert_eq!(
        Vec::<i64>::try_from(&batch.decoder_targets.get(1))?,
        vec![1, 9, 6, 2, 0]
    );
    assert!(matches!(
        dataset.get_batch(2),
        Err(PgnError::ValueError(_))
    ));
    Ok(())
}

#[test]
fn oov_dictionary_follows_the_batch_offsets() {
    let vocab = toy_vocab();
    let dataset = toy_dataset(&vocab, 3);
    let oov_dictionary = dataset.oov_dictionary();

    assert_eq!(oov_dictionary.len(), 8);
    for (position, example) in dataset.examples().iter().enumerate() {
        let key = batch_start_index(position / 3, 3) + position % 3;
        assert_eq!(
            oov_dictionary.lookup(key),
            Some(example.oov_words.as_slice())
        );
    }
    assert_eq!(
        oov_dictionary.lookup(batch_start_index(0, 3) + 1),
        Some(&["dog".to_string(), "rug".to_string()][..])
    );
    assert!(oov_dictionary.lookup(0).is_none());
}

#[test]
fn split_holds_out_the_tail() -> anyhow::Result<()> {
    let vocab = toy_vocab();
    let dataset = toy_dataset(&vocab, 2);
    let last_oov_words = dataset.examples()[6].oov_words.clone();

    let (train, test) = dataset.split(0.25)?;

    assert_eq!(train.len(), 6);
    assert_eq!(test.len(), 2);
    assert_eq!(test.steps_per_epoch(), 1);
    assert_eq!(
        test.oov_dictionary().lookup(batch_start_index(0, 2)),
        Some(last_oov_words.as_slice())
    );
    assert_eq!(last_oov_words, vec!["sofa"]);
    Ok(())
}

#[test]
fn invalid_dataset_settings_are_rejected() {
    let vocab = toy_vocab();
    let (sources, targets) = toy_examples();

    let zero_batch = SummarizationDataset::from_examples(
        &vocab,
        &sources,
        &targets,
        MaxLengths::default(),
        0,
        Device::Cpu,
    );
    assert!(matches!(
        zero_batch,
        Err(PgnError::InvalidConfigurationError(_))
    ));

    let misaligned = SummarizationDataset::from_examples(
        &vocab,
        &sources,
        &targets[..3],
        MaxLengths::default(),
        2,
        Device::Cpu,
    );
    assert!(matches!(misaligned, Err(PgnError::ValueError(_))));

    let dataset = toy_dataset(&vocab, 2);
    assert!(matches!(
        dataset.split(1.0),
        Err(PgnError::InvalidConfigurationError(_))
    ));
}

#[test]
fn tokenized_files_and_vocabularies_are_read_line_by_line() -> anyhow::Result<()> {
    let mut sources = tempfile::NamedTempFile::new()?;
    writeln!(sources, "the cat  sat")?;
    writeln!(sources, "on the mat")?;
    let mut vocab_file = tempfile::NamedTempFile::new()?;
    for token in ["<PAD>", "<START>", "<STOP>", "<UNK>", "the", "cat"].iter() {
        writeln!(vocab_file, "{}", token)?;
    }

    let lines = read_tokenized_lines(sources.path())?;
    let vocab = Vocab::from_file(vocab_file.path())?;

    assert_eq!(lines, vec![vec!["the", "cat", "sat"], vec!["on", "the", "mat"]]);
    assert_eq!(vocab.size(), 6);
    assert_eq!(vocab.token_to_id("cat"), Some(5));
    assert_eq!(vocab.id_to_token(3), Some("<UNK>"));
    Ok(())
}
