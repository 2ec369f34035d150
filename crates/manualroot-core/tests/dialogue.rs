mod common;

use common::{is_answer, is_rewrite, Fixture, ScriptedLlm};
use manualroot_core::config::{ConfidenceConfig, DialogueConfig, RetrievalConfig};
use manualroot_core::dialogue::prompts;
use manualroot_core::entity::MissingInfo;
use manualroot_core::error::ManualRootError;
use manualroot_core::{ConfidenceReason, DialoguePolicy, PolicyState, Turn};
use std::sync::Arc;

fn policy(fx: &Fixture, llm: &Arc<ScriptedLlm>) -> DialoguePolicy {
    DialoguePolicy::new(
        llm.clone(),
        fx.search(RetrievalConfig::default()),
        DialogueConfig::default(),
        ConfidenceConfig::default(),
    )
}

/// Three answered clarification rounds
fn exhausted_history() -> Vec<Turn> {
    vec![
        Turn::user("barulho na cabina"),
        Turn::assistant("Qual o modelo do elevador?"),
        Turn::user("não sei"),
        Turn::assistant("Qual a placa instalada?"),
        Turn::user("não sei"),
        Turn::assistant("Aparece algum código de erro?"),
    ]
}

#[tokio::test]
async fn test_greeting_skips_retrieval() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let llm = Arc::new(ScriptedLlm::unavailable());
    let before = fx.embedder.calls();

    let response = policy(&fx, &llm).respond("otis", "Otis", "Oi!", &[]).await;

    assert_eq!(response.state, PolicyState::Greeting);
    assert_eq!(response.text, prompts::greeting("Otis"));
    assert!(!response.needs_clarification);
    assert_eq!(fx.embedder.calls(), before);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_mandatory_gate_asks_for_identification() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let llm = Arc::new(ScriptedLlm::unavailable());
    let before = fx.embedder.calls();

    let response = policy(&fx, &llm)
        .respond("otis", "Otis", "a porta não fecha direito", &[])
        .await;

    assert_eq!(response.state, PolicyState::MandatoryGate);
    assert_eq!(response.text, prompts::default_clarification("Otis"));
    assert!(response.needs_clarification);
    assert!(response.verdict.is_none());
    assert_eq!(fx.embedder.calls(), before);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_short_query_uses_generated_question() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let question = "Qual o modelo do elevador e qual o sintoma que aparece?";
    let llm = Arc::new(ScriptedLlm::new(move |_| Ok(question.to_string())));

    let response = policy(&fx, &llm).respond("otis", "Otis", "ajuda", &[]).await;

    assert_eq!(response.state, PolicyState::ShortQueryGate);
    assert_eq!(response.text, question);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_short_query_rejects_malformed_question() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let llm = Arc::new(ScriptedLlm::new(|_| Ok("Modelo?".to_string())));

    let response = policy(&fx, &llm).respond("otis", "Otis", "ajuda", &[]).await;

    assert_eq!(response.state, PolicyState::ShortQueryGate);
    assert_eq!(response.text, prompts::default_clarification("Otis"));
}

#[tokio::test]
async fn test_progressive_question_asks_for_board() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let llm = Arc::new(ScriptedLlm::unavailable());

    let response = policy(&fx, &llm)
        .respond("otis", "Otis", "elevador gen2 com ruído estranho", &[])
        .await;

    assert_eq!(response.state, PolicyState::ProgressiveQuestion);
    assert_eq!(
        response.text,
        prompts::progressive_fallback(MissingInfo::BoardOrDrive)
    );
    assert!(response.needs_clarification);
    assert_eq!(response.verdict.unwrap().reason, ConfidenceReason::NoResults);
}

#[tokio::test]
async fn test_equipment_disambiguation_from_filenames() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let text = "salvamento de passageiros presos na cabina";
    for filename in ["Manual GEN2.pdf", "Manual OVF10.pdf", "Manual LCB2.pdf"] {
        fx.add("otis", filename, &[text]).await;
    }
    let llm = Arc::new(ScriptedLlm::unavailable());

    let response = policy(&fx, &llm)
        .respond("otis", "Otis", "salvamento de passageiros presos", &[])
        .await;

    assert_eq!(response.state, PolicyState::Disambiguation);
    assert_eq!(
        response.text,
        "Encontrei documentação sobre GEN2, LCB2, OVF10. Qual desses equipamentos você está trabalhando?"
    );
    assert!(response.needs_clarification);
    assert!(response.sources.is_empty());
    assert_eq!(response.verdict.unwrap().unique_docs.len(), 3);
}

#[tokio::test]
async fn test_exhausted_budget_answers_with_citations() {
    let fx = Fixture::new(&[("atlas", "Atlas")]);
    fx.add(
        "atlas",
        "Manual Atlas.pdf",
        &["barulho na cabina durante a viagem entre andares com vibração forte no motor"],
    )
    .await;
    let llm = Arc::new(ScriptedLlm::new(|messages| {
        if is_rewrite(messages) {
            Ok("barulho na cabina XO508".to_string())
        } else if is_answer(messages) {
            Ok("Verifique as guias e as corrediças da cabina.\n\n📄 Fonte: Manual Atlas, Página 1"
                .to_string())
        } else {
            Err(ManualRootError::Llm("unexpected call".into()))
        }
    }));

    let response = policy(&fx, &llm)
        .respond("atlas", "Atlas", "barulho na cabina XO508", &exhausted_history())
        .await;

    assert_eq!(response.state, PolicyState::Answer);
    assert!(!response.needs_clarification);
    assert_eq!(response.verdict.unwrap().reason, ConfidenceReason::TermsNotFound);
    assert!(response.text.contains("📄 Fonte"));
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].filename, "Manual Atlas");
    assert_eq!(response.sources[0].page, 1);

    let prompts = llm.prompts();
    let answer_call = prompts.iter().find(|m| is_answer(m)).unwrap();
    assert!(answer_call[0].content.contains("[Trecho 1]"));
    assert!(answer_call[0].content.contains("Arquivo: Manual Atlas"));
}

#[tokio::test]
async fn test_exhausted_budget_without_results() {
    let fx = Fixture::new(&[("otis", "Otis")]);
    let llm = Arc::new(ScriptedLlm::unavailable());

    let response = policy(&fx, &llm)
        .respond("otis", "Otis", "falha ao fechar porta no gen2", &exhausted_history())
        .await;

    assert_eq!(response.state, PolicyState::Answer);
    assert_eq!(response.text, prompts::ANSWER_EMPTY);
    assert_eq!(response.verdict.unwrap().reason, ConfidenceReason::NoResults);
}

#[tokio::test]
async fn test_answer_failure_drops_sources() {
    let fx = Fixture::new(&[("atlas", "Atlas")]);
    let text = "barulho na cabina durante a viagem";
    fx.add("atlas", "Manual Atlas.pdf", &[text]).await;
    let llm = Arc::new(ScriptedLlm::unavailable());

    let response = policy(&fx, &llm).respond("atlas", "Atlas", text, &[]).await;

    assert_eq!(response.state, PolicyState::Answer);
    assert!(response.verdict.unwrap().confident);
    assert_eq!(response.text, prompts::ANSWER_ERROR);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn test_near_tie_lists_documents_without_equipment_names() {
    let fx = Fixture::new(&[("atlas", "Atlas")]);
    let text = "barulho na cabina durante a viagem";
    for filename in ["Manual Alfa.pdf", "Manual Beta.pdf", "Manual Gama.pdf"] {
        fx.add("atlas", filename, &[text]).await;
    }
    let llm = Arc::new(ScriptedLlm::unavailable());

    let response = policy(&fx, &llm).respond("atlas", "Atlas", text, &[]).await;

    assert_eq!(response.state, PolicyState::Disambiguation);
    assert_eq!(response.text, prompts::default_clarification("Atlas"));
    assert!(response.needs_clarification);
    assert!(response.sources.is_empty());
    let verdict = response.verdict.unwrap();
    assert!(verdict.confident);
    assert_eq!(verdict.unique_docs.len(), 3);
    assert!(verdict.score_spread < 0.05);
}

#[tokio::test]
async fn test_near_tie_uses_generated_question_with_known_model() {
    let fx = Fixture::new(&[("atlas", "Atlas")]);
    let text = "barulho na cabina durante a viagem";
    for filename in ["Manual Alfa.pdf", "Manual Beta.pdf", "Manual Gama.pdf"] {
        fx.add("atlas", filename, &[text]).await;
    }
    let question = "Você está consultando o Manual Alfa, o Manual Beta ou o Manual Gama?";
    let llm = Arc::new(ScriptedLlm::new(move |messages| {
        if is_rewrite(messages) {
            Ok(text.to_string())
        } else {
            Ok(question.to_string())
        }
    }));
    let history = vec![
        Turn::user("elevador gen2 com barulho"),
        Turn::assistant("Em que momento o barulho aparece?"),
    ];

    let response = policy(&fx, &llm)
        .respond("atlas", "Atlas", text, &history)
        .await;

    assert_eq!(response.state, PolicyState::Disambiguation);
    assert_eq!(response.text, question);
    let prompts = llm.prompts();
    let asked = &prompts.last().unwrap()[0].content;
    for name in ["Manual Alfa", "Manual Beta", "Manual Gama"] {
        assert!(asked.contains(name), "{} missing from prompt", name);
    }
}

#[tokio::test]
async fn test_keyword_fallback_recovers_from_weak_rewrite() {
    let fx = Fixture::new(&[("atlas", "Atlas")]);
    fx.add("atlas", "Guia Atlas.pdf", &["Regulagem GEN2"]).await;
    let llm = Arc::new(ScriptedLlm::new(|messages| {
        if is_rewrite(messages) {
            Ok("porta não fecha corretamente".to_string())
        } else if is_answer(messages) {
            Ok("Confira a regulagem do operador de porta.\n\n📄 Fonte: Guia Atlas, Página 1".to_string())
        } else {
            Err(ManualRootError::Llm("unexpected call".into()))
        }
    }));
    let history = vec![
        Turn::user("elevador gen2 com placa lcb2"),
        Turn::assistant("Qual o defeito que aparece?"),
    ];

    let response = policy(&fx, &llm)
        .respond("atlas", "Atlas", "porta não fecha", &history)
        .await;

    assert_eq!(response.state, PolicyState::Answer);
    let verdict = response.verdict.unwrap();
    assert!(verdict.confident);
    assert_eq!(verdict.reason, ConfidenceReason::StrongMatchWithTerms);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].filename, "Guia Atlas");
}

#[tokio::test]
async fn test_diverged_rewrite_retries_original_message() {
    let fx = Fixture::new(&[("atlas", "Atlas")]);
    let message = "barulho forte quando a cabina sobe";
    fx.add("atlas", "Manual Atlas.pdf", &[message]).await;
    let llm = Arc::new(ScriptedLlm::new(move |messages| {
        if is_rewrite(messages) {
            Ok(format!(
                "{} verificar guias corrediças rolamentos polias cabos tração coxins \
                 amortecedores lubrificação alinhamento trilhos freio motor redutor \
                 contrapeso limitador polia",
                message
            ))
        } else if is_answer(messages) {
            Ok("Inspecione as corrediças da cabina.\n\n📄 Fonte: Manual Atlas, Página 1".to_string())
        } else {
            Err(ManualRootError::Llm("unexpected call".into()))
        }
    }));
    let history = vec![
        Turn::user("barulho no elevador"),
        Turn::assistant("Em que momento o barulho aparece?"),
    ];

    let response = policy(&fx, &llm)
        .respond("atlas", "Atlas", message, &history)
        .await;

    assert_eq!(response.state, PolicyState::Answer);
    let verdict = response.verdict.unwrap();
    assert!(verdict.confident);
    assert!(verdict.top_score > 0.99);
    assert_eq!(response.sources[0].filename, "Manual Atlas");
}
