//! End-to-end integration: delimited sources through resolution, annotation
//! harmonization, lazy joins, and export.

mod common;

use common::{gene_symbol_cache, init_tracing, numeric_table};
use polyomic::annotate::{SEMANTIC_OBJECT, SEMANTIC_SCORE, SEMANTIC_SUBJECT};
use polyomic::{
    read_delimited, records_to_table, to_graph, AdapterConfig, EdgeSpec, EntityTable,
    IntegrationPipeline, JoinError, JoinSpec, KeyResolver, LocalExecutor, Namespace,
    PartitionedExecutor, ReadOptions, RelationType, ResolveOptions, SampleSequence, SemanticType,
    SynonymTable, TableSchema, Value,
};
use std::collections::HashMap;
use std::io::Write;

/// Expression TSV on disk → wrapped under a declared schema → resolved onto
/// gene symbols → joined with a harmonized gene-disease source.
#[test]
fn test_full_integration_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    // Transcript-level expression keyed by versioned accessions.
    let expr_path = dir.path().join("expression.tsv");
    let mut f = std::fs::File::create(&expr_path).unwrap();
    writeln!(f, "gene_id\ttpm").unwrap();
    writeln!(f, "ENSG001.5\t10.5").unwrap();
    writeln!(f, "ENSG002\t3.25").unwrap();
    writeln!(f, "ENSG999\t1.0").unwrap();
    drop(f);

    let expr_frame = read_delimited(&expr_path, &ReadOptions::new("expr")).unwrap();
    let expr = EntityTable::from_frame(
        "expr",
        expr_frame,
        TableSchema::new()
            .with_key("gene_id")
            .with_column("tpm", SemanticType::Numeric),
    )
    .unwrap();

    let mut pipeline = IntegrationPipeline::new();
    let mut synonyms = SynonymTable::new(Namespace::GeneSymbol);
    synonyms.insert("ENSG001", "TP53");
    synonyms.insert("ENSG002", "BRCA1");
    pipeline.register_synonyms(Namespace::GeneSymbol, synonyms);

    let mapping = pipeline
        .add_omics_table(
            expr,
            Namespace::GeneId,
            Namespace::GeneSymbol,
            &ResolveOptions::default(),
        )
        .unwrap();
    // Version suffix stripped for ENSG001.5; ENSG999 retained unresolved.
    assert_eq!(mapping.resolved_count(), 2);
    assert_eq!(mapping.unresolved(), vec!["ENSG999"]);

    // Gene-disease annotation source through a declarative adapter.
    pipeline
        .register_adapter(
            AdapterConfig::new(
                "disgenet",
                RelationType::GeneDisease,
                Namespace::GeneSymbol,
                Namespace::GeneSymbol,
            )
            .with_column(SEMANTIC_SUBJECT, "geneSymbol")
            .with_column(SEMANTIC_OBJECT, "diseaseName")
            .with_column(SEMANTIC_SCORE, "score")
            .with_object_namespaces(
                Namespace::Custom("disease".into()),
                Namespace::Custom("disease".into()),
            ),
        )
        .unwrap();
    let mut gene_synonyms = SynonymTable::new(Namespace::GeneSymbol);
    gene_synonyms.insert("TP53", "TP53");
    gene_synonyms.insert("BRCA1", "BRCA1");
    pipeline.register_synonyms(Namespace::GeneSymbol, gene_synonyms);
    let mut disease_synonyms = SynonymTable::new(Namespace::Custom("disease".into()));
    disease_synonyms.insert("sarcoma", "sarcoma");
    disease_synonyms.insert("breast carcinoma", "breast carcinoma");
    pipeline.register_synonyms(Namespace::Custom("disease".into()), disease_synonyms);

    let annotation_path = dir.path().join("disgenet.tsv");
    let mut f = std::fs::File::create(&annotation_path).unwrap();
    writeln!(f, "geneSymbol\tdiseaseName\tscore").unwrap();
    writeln!(f, "TP53\tsarcoma\t0.92").unwrap();
    writeln!(f, "BRCA1\tbreast carcinoma\t0.95").unwrap();
    drop(f);

    let annotation_frame = read_delimited(&annotation_path, &ReadOptions::new("disgenet")).unwrap();
    let harmonized = pipeline
        .harmonizer()
        .harmonize("disgenet", &annotation_frame, &ResolveOptions::default())
        .unwrap();
    assert_eq!(harmonized.records.len(), 2);

    // Annotation records key by "subject"; align with the omics key column
    // before registering.
    let annotation_table = records_to_table(&harmonized.records, "disgenet").unwrap();
    let mut renames = HashMap::new();
    renames.insert("subject".to_string(), "gene_id".to_string());
    pipeline.add_table(annotation_table.rename_columns(&renames).unwrap());

    let dataset = pipeline
        .integrate(&JoinSpec::left("gene_id"), &LocalExecutor::new())
        .unwrap();
    // TP53, BRCA1, and the unresolved ENSG999 row all survive a left join.
    assert_eq!(dataset.rows_after(), 3);

    let frame = dataset.frame();
    let object_idx = frame.column_index("object").unwrap();
    let score_idx = frame.column_index("score").unwrap();
    let by_key: HashMap<String, (String, String)> = (0..frame.n_rows())
        .map(|r| {
            (
                frame.value(r, 0).to_string(),
                (
                    frame.value(r, object_idx).to_string(),
                    frame.value(r, score_idx).to_string(),
                ),
            )
        })
        .collect();
    assert_eq!(by_key["TP53"], ("sarcoma".to_string(), "0.92".to_string()));
    assert_eq!(
        by_key["BRCA1"],
        ("breast carcinoma".to_string(), "0.95".to_string())
    );
    // Unmatched left row null-fills the annotation side.
    assert_eq!(by_key["ENSG999"], (String::new(), String::new()));
}

/// Joining on a key absent from one input is an error, not a guess.
#[test]
fn test_mismatched_key_columns_fail() {
    init_tracing();
    let mut pipeline = IntegrationPipeline::new();
    pipeline.add_table(numeric_table("expr", "gene_id", &["TP53"], "tpm", &[1.0]));
    pipeline.add_table(numeric_table("cnv", "symbol", &["TP53"], "copies", &[2.0]));

    let err = pipeline
        .integrate(&JoinSpec::inner("gene_id"), &LocalExecutor::new())
        .unwrap_err();
    match err {
        JoinError::JoinKey(e) => {
            assert_eq!(e.key, "gene_id");
            assert_eq!(e.table, "cnv");
        }
        other => panic!("expected JoinKeyError, got {other:?}"),
    }
}

/// The canonical shape: wrapped tables with a shared canonical key column
/// join left-to-right, explode on multi-valued keys, and export cleanly.
#[test]
fn test_resolution_explosion_and_export() {
    init_tracing();

    let expr = numeric_table(
        "expr",
        "gene_id",
        &["ENSG001", "ENSG004"],
        "tpm",
        &[10.0, 20.0],
    );
    let cnv = numeric_table(
        "cnv",
        "gene_id",
        &["TP53", "KRAS", "KRAS2"],
        "copies",
        &[2.0, 4.0, 6.0],
    );

    let resolver = KeyResolver::new(gene_symbol_cache());
    let (resolved_expr, mapping) = resolver
        .resolve_table(
            &expr,
            &Namespace::GeneId,
            &Namespace::GeneSymbol,
            &ResolveOptions::default(),
        )
        .unwrap();
    // ENSG004 → KRAS and KRAS2: deliberate one-to-many expansion.
    assert_eq!(resolved_expr.n_rows(), 3);
    assert_eq!(mapping.ambiguous(), vec!["ENSG004"]);

    let mut pipeline = IntegrationPipeline::new();
    pipeline.add_table(resolved_expr);
    pipeline.add_table(cnv);

    let dataset = pipeline
        .integrate(&JoinSpec::inner("gene_id"), &LocalExecutor::new())
        .unwrap();
    // TP53, KRAS, KRAS2 all match: both expanded rows survive, each carrying
    // its copy of the original tpm attribute.
    assert_eq!(dataset.rows_after(), 3);
    let frame = dataset.frame();
    let tpm_idx = frame.column_index("tpm").unwrap();
    let kras_rows: Vec<f64> = (0..frame.n_rows())
        .filter(|&r| frame.value(r, 0).to_string().starts_with("KRAS"))
        .map(|r| frame.value(r, tpm_idx).as_f64().unwrap())
        .collect();
    assert_eq!(kras_rows, vec![20.0, 20.0]);

    // Same plan under the partitioned executor: identical rows as multisets.
    let partitioned = pipeline
        .integrate(&JoinSpec::inner("gene_id"), &PartitionedExecutor::new(3))
        .unwrap();
    assert_eq!(partitioned.rows_after(), dataset.rows_after());

    // Restartable sample sequence over the joined result.
    let samples = SampleSequence::new(&dataset, &["tpm", "copies"], "gene_id").unwrap();
    assert_eq!(samples.len(), 3);
    let first_pass: Vec<_> = samples.iter().collect();
    let second_pass: Vec<_> = samples.iter().collect();
    assert_eq!(first_pass, second_pass);
}

/// Interaction data exported as a graph carries scores and attributes and
/// dedupes edge identities.
#[test]
fn test_graph_export_from_joined_annotations() {
    init_tracing();

    let ppi = {
        let frame = polyomic::Frame::new(vec![
            polyomic::Column::new(
                "gene_id",
                "ppi",
                SemanticType::String,
                vec![Value::from("TP53"), Value::from("BRCA1")],
            ),
            polyomic::Column::new(
                "partner",
                "ppi",
                SemanticType::String,
                vec![Value::from("BRCA1"), Value::from("EGFR")],
            ),
            polyomic::Column::new(
                "confidence",
                "ppi",
                SemanticType::Numeric,
                vec![Value::Float(0.8), Value::Float(0.7)],
            ),
        ])
        .unwrap();
        EntityTable::from_frame("ppi", frame, TableSchema::new().with_key("gene_id")).unwrap()
    };
    let expr = numeric_table(
        "expr",
        "gene_id",
        &["TP53", "BRCA1", "EGFR"],
        "tpm",
        &[1.0, 2.0, 3.0],
    );

    let mut pipeline = IntegrationPipeline::new();
    pipeline.add_table(expr);
    pipeline.add_table(ppi);
    let dataset = pipeline
        .integrate(&JoinSpec::outer("gene_id"), &LocalExecutor::new())
        .unwrap();

    let graph = to_graph(
        &dataset,
        &[("gene_id", Namespace::GeneSymbol)],
        &[EdgeSpec::new(
            "gene_id",
            "partner",
            RelationType::GeneGene,
            "ppi",
            Namespace::GeneSymbol,
        )
        .with_score_column("confidence")
        .with_attribute_column("tpm")],
    )
    .unwrap();

    assert_eq!(graph.edge_count(), 2);
    let tp53 = polyomic::Identifier::new(Namespace::GeneSymbol, "TP53");
    assert!(graph.contains_node(&tp53));
    assert_eq!(graph.neighbors(&tp53).len(), 1);
    assert_eq!(graph.edges()[0].score, Some(0.8));
    assert_eq!(
        graph.edges()[0].attributes.get("tpm"),
        Some(&Value::Float(1.0))
    );
}
