//! Narrowing loop behavior against fixture taxonomies

use async_trait::async_trait;
use gkg_core::{CoreError, EngineConfig, FailureKind, NarrowingEngine, RetryPolicy};
use gkg_graph::{labels, ConceptGraph, ConceptId, ConceptNode, SharedGraph, TaxonomyGraph};
use gkg_oracle::{
    ClassificationOracle, ClassifyRequest, EnrichRequest, InitialEntry, OracleError, PickRequest,
    SharedOracle,
};
use gkg_test_utils::{
    chain_graph, scenario_graph, tree_taxonomy, CountingGraph, FirstCandidateOracle,
    SCENARIO_SENTENCE,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

mock! {
    pub Oracle {}

    #[async_trait]
    impl ClassificationOracle for Oracle {
        async fn classify_initial(&self, request: ClassifyRequest) -> Result<Vec<InitialEntry>, OracleError>;
        async fn pick_most_relevant(&self, request: PickRequest) -> Result<ConceptId, OracleError>;
        async fn enrich(&self, request: EnrichRequest) -> Result<String, OracleError>;
    }
}

fn engine(graph: SharedGraph, oracle: SharedOracle) -> NarrowingEngine {
    NarrowingEngine::new(graph, oracle).with_retry(RetryPolicy::immediate(3))
}

fn single_entry(concept: &'static str) -> MockOracle {
    let mut oracle = MockOracle::new();
    oracle
        .expect_classify_initial()
        .returning(move |_| Ok(vec![InitialEntry::new(format!("issue with {concept}"), [concept])]));
    oracle
}

#[tokio::test]
async fn test_scenario_resolves_each_item_in_one_round() {
    let graph = Arc::new(CountingGraph::new(scenario_graph()));
    let oracle = Arc::new(FirstCandidateOracle::new());

    let batch = engine(graph.clone(), oracle.clone())
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert!(batch.is_fully_resolved());
    assert_eq!(batch.rounds(), 1);
    for item in batch.items() {
        assert_eq!(item.rounds(), 1);
        assert_eq!(item.concepts().len(), 1);
    }
    let concepts: Vec<&str> = batch
        .items()
        .iter()
        .filter_map(|i| i.concept().map(ConceptId::as_str))
        .collect();
    assert_eq!(concepts, vec!["Articles-Rule-1", "Possessives-Rule-1"]);
    assert_eq!(oracle.classify_calls(), 1);
    assert_eq!(oracle.pick_calls(), 2);
    assert_eq!(graph.top_calls(), 1);
}

#[tokio::test]
async fn test_settled_batch_is_never_requeried() {
    let graph = Arc::new(CountingGraph::new(scenario_graph()));
    let oracle = Arc::new(FirstCandidateOracle::new());
    let engine = engine(graph.clone(), oracle.clone());

    let mut batch = engine.resolve(SCENARIO_SENTENCE).await.unwrap();
    let graph_calls = graph.total_calls();
    let picks = oracle.pick_calls();

    assert_eq!(engine.run_round(&mut batch).await, 0);
    assert_eq!(batch.rounds(), 1);
    assert_eq!(graph.total_calls(), graph_calls);
    assert_eq!(oracle.pick_calls(), picks);
}

#[tokio::test]
async fn test_initial_rule_skips_narrowing() {
    let mut taxonomy = TaxonomyGraph::new();
    taxonomy
        .add_node(ConceptNode::top("Agreement").with_label(labels::RULE))
        .unwrap();
    let graph = Arc::new(CountingGraph::new(taxonomy));
    let oracle = Arc::new(FirstCandidateOracle::new());

    let batch = engine(graph.clone(), oracle.clone())
        .resolve("He go home.")
        .await
        .unwrap();

    assert!(batch.is_fully_resolved());
    assert_eq!(batch.rounds(), 0);
    assert_eq!(graph.neighbor_calls(), 0);
    assert_eq!(oracle.pick_calls(), 0);
}

#[tokio::test]
async fn test_multi_concept_entry_is_split() {
    let graph = Arc::new(scenario_graph());
    let oracle = Arc::new(FirstCandidateOracle::with_initial(vec![InitialEntry::new(
        "determiner and possessive",
        ["Articles", "Possessives"],
    )]));

    let batch = engine(graph, oracle).resolve(SCENARIO_SENTENCE).await.unwrap();

    assert_eq!(batch.len(), 2);
    assert!(batch.is_fully_resolved());
    assert!(batch
        .items()
        .iter()
        .all(|i| i.analysis() == "determiner and possessive" && i.concepts().len() == 1));
}

#[tokio::test]
async fn test_empty_classification_is_an_empty_batch() {
    let graph = Arc::new(scenario_graph());
    let oracle = Arc::new(FirstCandidateOracle::with_initial(Vec::new()));

    let batch = engine(graph, oracle).resolve("A perfectly fine sentence.").await.unwrap();

    assert!(batch.is_empty());
    assert!(batch.is_settled());
    assert_eq!(batch.rounds(), 0);
}

#[tokio::test]
async fn test_dead_end_fails_only_its_item() {
    let mut taxonomy = scenario_graph();
    taxonomy.add_node(ConceptNode::top("Orphan")).unwrap();
    let graph = Arc::new(taxonomy);
    let oracle = Arc::new(FirstCandidateOracle::new());

    let batch = engine(graph, oracle).resolve(SCENARIO_SENTENCE).await.unwrap();

    assert_eq!(batch.len(), 3);
    let failures = batch.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::NarrowingDeadEnd);
    assert_eq!(
        batch.items().iter().filter(|i| i.is_resolved()).count(),
        2
    );
}

#[tokio::test]
async fn test_round_ceiling_fails_deep_item() {
    let graph = Arc::new(chain_graph(5));
    let oracle = Arc::new(FirstCandidateOracle::new());
    let config = EngineConfig {
        max_rounds: 2,
        ..EngineConfig::default()
    };

    let batch = engine(graph, oracle)
        .with_config(config)
        .resolve("deep")
        .await
        .unwrap();

    let item = &batch.items()[0];
    assert_eq!(item.failure().map(|f| f.kind), Some(FailureKind::NarrowingExceededDepth));
    assert_eq!(item.rounds(), 2);
    assert_eq!(item.concept(), Some(&ConceptId::from("c2")));
}

#[tokio::test]
async fn test_out_of_set_pick_retried_once_with_reminder() {
    let mut oracle = single_entry("Articles");
    oracle
        .expect_pick_most_relevant()
        .withf(|req| req.reminder.is_none())
        .times(1)
        .returning(|_| Ok("Possessives-Rule-1".into()));
    oracle
        .expect_pick_most_relevant()
        .withf(|req| req.reminder.is_some())
        .times(1)
        .returning(|req| Ok(req.candidates[0].clone()));

    let batch = engine(Arc::new(scenario_graph()), Arc::new(oracle))
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap();

    assert!(batch.is_fully_resolved());
    assert_eq!(batch.items()[0].concept(), Some(&ConceptId::from("Articles-Rule-1")));
}

#[tokio::test]
async fn test_repeated_violation_fails_only_that_item() {
    let mut oracle = MockOracle::new();
    oracle.expect_classify_initial().returning(|_| {
        Ok(vec![
            InitialEntry::new("article", ["Articles"]),
            InitialEntry::new("possessive", ["Possessives"]),
        ])
    });
    oracle
        .expect_pick_most_relevant()
        .withf(|req| req.analysis == "article")
        .times(2)
        .returning(|_| Ok("Nowhere".into()));
    oracle
        .expect_pick_most_relevant()
        .withf(|req| req.analysis == "possessive")
        .times(1)
        .returning(|req| Ok(req.candidates[0].clone()));

    let batch = engine(Arc::new(scenario_graph()), Arc::new(oracle))
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap();

    let failures = batch.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_index, 0);
    assert_eq!(failures[0].kind, FailureKind::OracleContractViolation);
    assert!(batch.items()[1].is_resolved());
}

#[tokio::test]
async fn test_transient_pick_failure_exhausts_retries() {
    let mut oracle = single_entry("Articles");
    oracle
        .expect_pick_most_relevant()
        .times(3)
        .returning(|_| Err(OracleError::Unavailable("503".into())));

    let batch = engine(Arc::new(scenario_graph()), Arc::new(oracle))
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap();

    assert_eq!(
        batch.items()[0].failure().map(|f| f.kind),
        Some(FailureKind::OracleUnavailable)
    );
}

#[tokio::test]
async fn test_invalid_initial_entry_retried_then_isolated() {
    let mut oracle = MockOracle::new();
    oracle
        .expect_classify_initial()
        .withf(|req| req.reminder.is_none())
        .times(1)
        .returning(|_| Ok(vec![InitialEntry::new("tense", ["Tense"])]));
    oracle
        .expect_classify_initial()
        .withf(|req| req.reminder.is_some())
        .times(1)
        .returning(|_| {
            Ok(vec![
                InitialEntry::new("tense", ["Tense"]),
                InitialEntry::new("article", ["Articles"]),
            ])
        });
    oracle
        .expect_pick_most_relevant()
        .returning(|req| Ok(req.candidates[0].clone()));

    let batch = engine(Arc::new(scenario_graph()), Arc::new(oracle))
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert_eq!(
        batch.items()[0].failure().map(|f| f.kind),
        Some(FailureKind::OracleContractViolation)
    );
    assert!(batch.items()[1].is_resolved());
}

#[tokio::test]
async fn test_mixed_entry_fails_only_the_unknown_concept() {
    let mut oracle = MockOracle::new();
    oracle
        .expect_classify_initial()
        .times(2)
        .returning(|_| Ok(vec![InitialEntry::new("article and tense", ["Articles", "Tense"])]));
    oracle
        .expect_pick_most_relevant()
        .returning(|req| Ok(req.candidates[0].clone()));

    let batch = engine(Arc::new(scenario_graph()), Arc::new(oracle))
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap();

    assert_eq!(batch.len(), 2);
    let resolved = &batch.items()[0];
    assert!(resolved.is_resolved());
    assert_eq!(resolved.concept(), Some(&ConceptId::from("Articles-Rule-1")));

    let failed = &batch.items()[1];
    assert_eq!(failed.concepts(), &[ConceptId::from("Tense")]);
    assert_eq!(failed.analysis(), "article and tense");
    let failure = failed.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::OracleContractViolation);
    assert_eq!(failure.item_index, 1);
}

#[tokio::test]
async fn test_initial_classification_unavailable_aborts() {
    let mut oracle = MockOracle::new();
    oracle
        .expect_classify_initial()
        .times(3)
        .returning(|_| Err(OracleError::Unavailable("connection refused".into())));

    let err = engine(Arc::new(scenario_graph()), Arc::new(oracle))
        .resolve(SCENARIO_SENTENCE)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Oracle(OracleError::Unavailable(_))));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_taxonomy_without_tops_is_graph_error() {
    let mut taxonomy = TaxonomyGraph::new();
    taxonomy.add_node(ConceptNode::concept("Loose")).unwrap();

    let err = engine(Arc::new(taxonomy), Arc::new(FirstCandidateOracle::new()))
        .classify(SCENARIO_SENTENCE)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Graph(_)));
}

#[tokio::test]
async fn test_blank_sentence_is_invalid_input() {
    let err = engine(Arc::new(scenario_graph()), Arc::new(FirstCandidateOracle::new()))
        .classify("   ")
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidInput(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_tree_narrowing_terminates_within_depth(parents in proptest::collection::vec(0..64usize, 1..20)) {
        let taxonomy = tree_taxonomy(&parents);
        let depth = taxonomy.descent_depth().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

        let config = EngineConfig {
            max_rounds: u32::try_from(depth).unwrap() + 1,
            ..EngineConfig::default()
        };
        let graph: SharedGraph = Arc::new(taxonomy);
        let batch = rt
            .block_on(engine(graph.clone(), Arc::new(FirstCandidateOracle::new())).with_config(config).resolve("s"))
            .unwrap();

        prop_assert!(batch.is_fully_resolved());
        prop_assert!(batch.rounds() as usize <= depth);
        for item in batch.items() {
            let concept = item.concept().unwrap();
            prop_assert!(rt.block_on(graph.is_rule(concept)).unwrap());
        }
    }
}
