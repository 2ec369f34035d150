//! Prompts for the reasoning service and deterministic fallbacks
//!
//! Every fallback that asks something ends with '?'.

use crate::confidence::ConfidenceReason;
use crate::entity::{KnownContext, MissingInfo};

pub const ANSWER_ERROR: &str = "Desculpe, ocorreu um erro ao gerar a resposta. Tente novamente.";

pub const ANSWER_EMPTY: &str =
    "Não encontrei informação suficiente nos documentos desta marca para responder com segurança.";

const NOT_INFORMED: &str = "não informado";

pub fn greeting(brand_name: &str) -> String {
    format!(
        "Olá! Sou o assistente técnico de elevadores {}. Descreva o problema informando \
         o modelo do elevador, a placa/controlador e o código de erro, se houver.",
        brand_name
    )
}

/// Canned request for model, board and error code
pub fn default_clarification(brand_name: &str) -> String {
    format!(
        "Para eu te responder com precisão em {}, pode me confirmar o modelo/geração do \
         elevador (como aparece na etiqueta), a placa/controlador e o código de erro, se houver?",
        brand_name
    )
}

/// Fallback when a clarification could not be generated, by verdict reason
pub fn reason_fallback(reason: ConfidenceReason, brand_name: &str) -> String {
    match reason {
        ConfidenceReason::TermsNotFound => "Não encontrei documentos com esse termo exato nos \
             manuais. Às vezes o nome no manual é diferente do nome popular do equipamento. \
             Pode verificar o nome ou modelo correto?"
            .to_string(),
        ConfidenceReason::TooManySimilarDocs => "Encontrei informações em vários documentos \
             sobre esse tema. Para ser mais preciso, qual modelo ou placa do elevador você \
             está trabalhando?"
            .to_string(),
        ConfidenceReason::LowScores => "Não encontrei uma correspondência forte nos manuais. \
             Pode me dar mais detalhes, como o modelo do elevador, o código de erro no painel, \
             ou a placa específica?"
            .to_string(),
        _ => default_clarification(brand_name),
    }
}

/// Fallback progressive question for the highest-priority missing fact
pub fn progressive_fallback(missing: MissingInfo) -> &'static str {
    match missing {
        MissingInfo::Model => {
            "Qual o modelo ou geração do elevador que você está atendendo, como Gen2, \
             ADV-210, MRL, OVF10, Miconic BX ou outro?"
        }
        MissingInfo::BoardOrDrive => {
            "Qual a placa ou controlador instalado nesse elevador, como LCB1, LCB2, LCBII, \
             RCB2, GECB ou outro?"
        }
        MissingInfo::SymptomOrError => {
            "Qual o sintoma exato ou código de erro que está aparecendo, como porta não \
             fecha, erro no display ou elevador não parte?"
        }
    }
}

pub fn disambiguation_fallback(equipment_list: &str) -> String {
    format!(
        "Encontrei documentação sobre {}. Qual desses equipamentos você está trabalhando?",
        equipment_list
    )
}

/// "- file (score: 0.82)" lines, one per document
pub fn found_docs_list(docs: &[(String, f64)]) -> String {
    if docs.is_empty() {
        return "Nenhum".to_string();
    }
    docs.iter()
        .map(|(name, score)| format!("- {} (score: {:.2})", name, score))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn short_query(brand_name: &str, query: &str) -> String {
    format!(
        "O técnico mandou uma mensagem curta ou genérica sobre elevadores {brand}.\n\n\
         Mensagem: {query}\n\n\
         Faça UMA pergunta objetiva pedindo o que falta para uma resposta precisa: \
         modelo do elevador, código de erro ou sintoma. Termine com \"?\", no máximo 2 linhas.\n\n\
         Responda APENAS com a pergunta.",
        brand = brand_name,
        query = query,
    )
}

pub fn smart_clarification(
    brand_name: &str,
    query: &str,
    reason: ConfidenceReason,
    found_docs: &str,
) -> String {
    format!(
        "Você é um assistente técnico de elevadores {brand}.\n\
         O técnico perguntou: \"{query}\"\n\n\
         A busca nos manuais não achou um resultado forte. Motivo: {reason}\n\
         Documentos encontrados:\n{docs}\n\n\
         REGRAS:\n\
         1. Faça UMA pergunta curta para identificar modelo, geração, placa ou equipamento.\n\
         2. A pergunta é uma frase completa terminada em \"?\".\n\
         3. Sem parênteses. Para dar opções use \"como\" seguido dos nomes separados por vírgula.\n\
         4. No máximo 2 linhas.\n\
         5. Se o motivo for terms_not_found, pergunte se o nome do equipamento está correto.\n\n\
         Responda APENAS com a pergunta.",
        brand = brand_name,
        query = query,
        reason = reason,
        docs = found_docs,
    )
}

pub fn progressive_question(
    brand_name: &str,
    known: &KnownContext,
    missing: &[MissingInfo],
    round: usize,
    max_rounds: usize,
    found_docs: &str,
) -> String {
    let missing: Vec<&str> = missing.iter().map(MissingInfo::describe).collect();
    let other = if known.other.is_empty() {
        "nenhum".to_string()
    } else {
        known.other.join(", ")
    };
    format!(
        "Você é um assistente técnico de elevadores {brand}, identificando o equipamento \
         do técnico com perguntas progressivas.\n\n\
         Já sabemos:\n\
         - Modelo/equipamento: {model}\n\
         - Placa/controlador: {board}\n\
         - Drive/inversor: {drive}\n\
         - Sintoma/erro: {symptom}\n\
         - Outros: {other}\n\n\
         Falta saber: {missing}\n\
         Rodada {round} de {max}\n\n\
         Documentos possíveis:\n{docs}\n\n\
         REGRAS:\n\
         1. UMA pergunta curta sobre o item mais importante que falta.\n\
         2. Cite opções reais dos documentos encontrados quando ajudar.\n\
         3. Não repita o que já foi respondido.\n\
         4. Na última rodada, pergunte o que ajuda a fechar o diagnóstico.\n\
         5. Termine com \"?\", no máximo 2 linhas.\n\n\
         Responda APENAS com a pergunta.",
        brand = brand_name,
        model = known.model.as_deref().unwrap_or(NOT_INFORMED),
        board = known.board.as_deref().unwrap_or(NOT_INFORMED),
        drive = known.drive.as_deref().unwrap_or(NOT_INFORMED),
        symptom = known
            .symptom
            .as_deref()
            .or(known.error_code.as_deref())
            .unwrap_or(NOT_INFORMED),
        other = other,
        missing = missing.join(", "),
        round = round,
        max = max_rounds,
        docs = found_docs,
    )
}

pub fn disambiguation(brand_name: &str, query: &str, found_docs: &str, equipment: &str) -> String {
    format!(
        "Você é um assistente técnico de elevadores {brand}.\n\
         A busca trouxe documentos de equipamentos diferentes.\n\n\
         Pergunta do técnico: \"{query}\"\n\n\
         Documentos por relevância:\n{docs}\n\n\
         Opções distintas (equipamentos ou manuais): {equipment}\n\n\
         REGRAS:\n\
         1. UMA pergunta curta listando as opções e pedindo para o técnico escolher.\n\
         2. Nomes separados por vírgula, o mais relevante primeiro.\n\
         3. Termine com \"?\", no máximo 3 linhas.\n\n\
         Responda APENAS com a pergunta.",
        brand = brand_name,
        query = query,
        docs = found_docs,
        equipment = equipment,
    )
}

/// System prompt for answer composition
pub fn answer_system(brand_name: &str, context: &str, history: &str) -> String {
    format!(
        "Você é um assistente técnico especialista em elevadores {brand}, com acesso aos \
         manuais técnicos desta marca.\n\n\
         REGRAS:\n\
         1. Responda com base nos trechos recuperados abaixo.\n\
         2. Cite sempre as fontes usadas no final, uma por linha: \"📄 Fonte: [arquivo], Página [número]\".\n\
         3. Se há documentos sobre o modelo/placa perguntado, apresente o que eles dizem mesmo \
         que não respondam exatamente à pergunta, e diga o que falta.\n\
         4. Nunca invente especificações, valores elétricos ou procedimentos.\n\
         5. Se os trechos vêm de modelos ou gerações diferentes, não misture: separe por modelo.\n\
         6. Para \"porta abre/fecha e não parte\", comece por DW, DFC, contato de porta, \
         trinco e cadeia de segurança (ES).\n\
         7. Use markdown: **negrito** para componentes, listas numeradas para procedimentos, \
         parágrafos curtos.\n\
         8. Escreva em português claro e complete a resposta.\n\n\
         Contexto dos documentos:\n{context}\n\n\
         Histórico da conversa:\n{history}",
        brand = brand_name,
        context = context,
        history = history,
    )
}

/// Extra instruction listing related documents not used in the answer
pub fn related_documents_instruction(related: &[String]) -> String {
    format!(
        "\n\nINSTRUÇÃO ADICIONAL: ao final, mencione que também existem documentos \
         relacionados disponíveis: {}. Pergunte se o técnico quer consultar algum deles.",
        related.join(", ")
    )
}
