//! The legal-analysis LLM service: one prompt per pipeline stage.
//!
//! Prompts are French (the analysis product is French-language) and spell
//! out the canonical clause types and integer scales so the model answers
//! with values the normalizer accepts. Each stage carries its own
//! temperature and token budget.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use legalens_core::llm::LegalLlm;

use crate::backend::{ChatBackend, ChatRequest};
use crate::parse::extract_json_array;

/// Characters of document text included in the summary prompt.
const SUMMARY_PREVIEW_CHARS: usize = 2000;

const CLAUSES_SYSTEM: &str = "Vous êtes un expert juridique spécialisé dans l'analyse de contrats. \
Votre tâche est d'extraire TOUTES les clauses importantes du document fourni, même si elles \
sont implicites ou peu formalisées. Si le document ne contient pas de clauses explicites, \
identifiez les obligations, les droits et les restrictions implicites.\n\n\
Vous devez identifier le type de chaque clause parmi les options suivantes EXACTEMENT:\n\
- obligation\n- restriction\n- right\n- termination\n- confidentiality\n\
- intellectual_property\n- liability\n- payment\n- duration\n- other\n\n\
Le niveau de risque doit être un nombre entier entre 1 et 5, où:\n\
1 = Très faible\n2 = Faible\n3 = Moyen\n4 = Élevé\n5 = Très élevé\n";

const CLAUSES_JSON_INSTRUCTIONS: &str = "Répondez au format JSON suivant:\n\
[\n  {\n    \"title\": \"Titre de la clause\",\n    \"content\": \"Contenu exact de la clause\",\n    \
\"type\": \"type_de_clause\",\n    \"risk_level\": niveau_de_risque,\n    \
\"analysis\": \"Analyse juridique de la clause\"\n  },\n  ...\n]";

const RECOMMENDATIONS_SYSTEM: &str = "Vous êtes un expert juridique spécialisé dans l'analyse de contrats.\n\
Votre tâche est de générer des recommandations pertinentes basées sur les clauses extraites d'un \
document juridique.\n\n\
Les priorités doivent être exprimées en nombres entiers avec:\n\
1 = Basse priorité\n2 = Priorité moyenne\n3 = Haute priorité\n";

const RECOMMENDATIONS_JSON_INSTRUCTIONS: &str = "Répondez au format JSON suivant:\n\
[\n  {\n    \"title\": \"Titre de la recommandation\",\n    \"description\": \"Description détaillée\",\n    \
\"priority\": niveau_de_priorité,\n    \"suggested_text\": \"Texte suggéré (si applicable)\",\n    \
\"related_clauses\": [\"Titre de la clause 1\", \"Titre de la clause 2\", ...]\n  },\n  ...\n]";

const RISKS_SYSTEM: &str = "Vous êtes un expert juridique spécialisé dans l'analyse de risques contractuels.\n\
Votre tâche est d'identifier et d'évaluer les risques juridiques potentiels basés sur les clauses \
extraites.\n\n\
Les niveaux de risque doivent être un nombre entier entre 1 et 5:\n\
1 = Très faible\n2 = Faible\n3 = Moyen\n4 = Élevé\n5 = Très élevé\n";

const RISKS_JSON_INSTRUCTIONS: &str = "Répondez au format JSON suivant:\n\
[\n  {\n    \"title\": \"Titre du risque\",\n    \"description\": \"Description du risque\",\n    \
\"level\": niveau_de_risque,\n    \"impact\": \"Impact potentiel\",\n    \
\"mitigation\": \"Pistes de mitigation (facultatif)\"\n  },\n  ...\n]";

const PRECEDENTS_SYSTEM: &str = "Vous êtes un expert juridique spécialisé dans la jurisprudence. \
Votre tâche est d'identifier des précédents juridiques (décisions de justice, arrêts, affaires \
de référence) pertinents pour les clauses extraites d'un document juridique.";

const PRECEDENTS_JSON_INSTRUCTIONS: &str = "Répondez au format JSON suivant:\n\
[\n  {\n    \"title\": \"Intitulé du précédent\",\n    \"description\": \"Description de l'affaire\",\n    \
\"type\": \"jurisprudence\",\n    \"relevance\": \"Pertinence pour le document analysé\",\n    \
\"source\": \"Juridiction et référence (si connue)\"\n  },\n  ...\n]";

const SUMMARY_SYSTEM: &str = "Vous êtes un expert juridique spécialisé dans la synthèse de documents \
contractuels. Votre tâche est de générer un résumé concis mais complet d'un document juridique et \
de son analyse. Le résumé doit être clair, précis et accessible à des non-juristes tout en restant \
juridiquement rigoureux.";

/// [`LegalLlm`] implementation over a [`ChatBackend`] (usually a failover
/// chain). Parse failures on list stages yield empty lists; transport
/// failures propagate.
pub struct LlmAnalyzer {
    chat: Arc<dyn ChatBackend>,
}

impl LlmAnalyzer {
    pub fn new(chat: Arc<dyn ChatBackend>) -> Self {
        Self { chat }
    }

    async fn generate_records(
        &self,
        stage: &str,
        request: ChatRequest,
    ) -> Result<Vec<Value>> {
        let text = self.chat.generate(&request).await?;
        let records = extract_json_array(&text);
        info!(stage, count = records.len(), "parsed records from model output");
        Ok(records)
    }
}

fn clauses_json(clauses: &[Value]) -> String {
    serde_json::to_string_pretty(clauses).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl LegalLlm for LlmAnalyzer {
    async fn extract_clauses(
        &self,
        document_text: &str,
        document_type: &str,
    ) -> Result<Vec<Value>> {
        info!(document_type, "extracting clauses");

        let prompt = format!(
            "Analysez le document juridique suivant de type {document_type} et extrayez les \
             clauses importantes.\n\
             Pour chaque clause, fournissez:\n\
             1. Un titre descriptif\n\
             2. Le contenu exact de la clause\n\
             3. Le type de clause (UNIQUEMENT un de ces termes exacts: obligation, restriction, \
             right, termination, confidentiality, intellectual_property, liability, payment, \
             duration, other)\n\
             4. Le niveau de risque (UNIQUEMENT un nombre entier entre 1 et 5)\n\
             5. Une analyse juridique de la clause\n\n\
             Document:\n{document_text}\n\n\
             Si le document ne contient pas de clauses explicites, identifiez les éléments \
             implicites.\n\n{CLAUSES_JSON_INSTRUCTIONS}"
        );

        self.generate_records(
            "extract_clauses",
            ChatRequest {
                system: CLAUSES_SYSTEM.to_string(),
                prompt,
                temperature: 0.3,
                max_tokens: 4000,
            },
        )
        .await
    }

    async fn generate_recommendations(
        &self,
        clauses: &[Value],
        document_type: &str,
    ) -> Result<Vec<Value>> {
        info!(document_type, "generating recommendations");

        let prompt = format!(
            "Sur la base des clauses suivantes extraites d'un document juridique de type \
             {document_type}, générez des recommandations pertinentes pour améliorer le contrat \
             ou atténuer les risques identifiés.\n\n\
             Clauses extraites:\n{}\n\n\
             Pour chaque recommandation, fournissez:\n\
             1. Un titre descriptif\n\
             2. Une description détaillée\n\
             3. Une priorité (1, 2 ou 3)\n\
             4. Un texte suggéré (si applicable)\n\
             5. Les titres des clauses concernées\n\n\
             Si le document manque de clauses essentielles, suggérez l'ajout de ces clauses.\n\n\
             {RECOMMENDATIONS_JSON_INSTRUCTIONS}",
            clauses_json(clauses)
        );

        self.generate_records(
            "generate_recommendations",
            ChatRequest {
                system: RECOMMENDATIONS_SYSTEM.to_string(),
                prompt,
                temperature: 0.4,
                max_tokens: 4000,
            },
        )
        .await
    }

    async fn identify_risks(&self, clauses: &[Value], document_type: &str) -> Result<Vec<Value>> {
        info!(document_type, "identifying risks");

        let prompt = format!(
            "Sur la base des clauses suivantes extraites d'un document juridique de type \
             {document_type}, identifiez et évaluez les risques juridiques potentiels.\n\n\
             Clauses extraites:\n{}\n\n\
             Pour chaque risque, fournissez:\n\
             1. Un titre descriptif\n\
             2. Une description détaillée\n\
             3. Un niveau de risque (1 à 5)\n\
             4. Un impact potentiel\n\
             5. Des pistes de mitigation (facultatif)\n\n{RISKS_JSON_INSTRUCTIONS}",
            clauses_json(clauses)
        );

        self.generate_records(
            "identify_risks",
            ChatRequest {
                system: RISKS_SYSTEM.to_string(),
                prompt,
                temperature: 0.3,
                max_tokens: 4000,
            },
        )
        .await
    }

    async fn identify_precedents(
        &self,
        clauses: &[Value],
        document_type: &str,
    ) -> Result<Vec<Value>> {
        info!(document_type, "identifying precedents");

        let prompt = format!(
            "Sur la base des clauses suivantes extraites d'un document juridique de type \
             {document_type}, identifiez des précédents juridiques pertinents (jurisprudence, \
             décisions de référence) qui éclairent les risques de ce document.\n\n\
             Clauses extraites:\n{}\n\n\
             Pour chaque précédent, fournissez:\n\
             1. L'intitulé de l'affaire ou de la décision\n\
             2. Une description de l'affaire et de sa conclusion\n\
             3. Le type de précédent\n\
             4. Sa pertinence pour le document analysé\n\
             5. La source (juridiction, référence) si connue\n\n\
             {PRECEDENTS_JSON_INSTRUCTIONS}",
            clauses_json(clauses)
        );

        self.generate_records(
            "identify_precedents",
            ChatRequest {
                system: PRECEDENTS_SYSTEM.to_string(),
                prompt,
                temperature: 0.3,
                max_tokens: 4000,
            },
        )
        .await
    }

    async fn generate_summary(
        &self,
        document_text: &str,
        clauses: &[Value],
        risks: &[Value],
        document_type: &str,
    ) -> Result<String> {
        info!(document_type, "generating summary");

        let preview: String = document_text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        let prompt = format!(
            "Générez un résumé concis mais complet du document juridique de type {document_type} \
             et de son analyse.\n\n\
             Le résumé doit inclure:\n\
             1. Une vue d'ensemble du document\n\
             2. Les principales clauses et leurs implications\n\
             3. Les risques majeurs identifiés\n\
             4. Une conclusion sur la qualité juridique du document\n\n\
             Document (aperçu) :\n{preview}...\n\n\
             Clauses extraites:\n{}\n\n\
             Risques identifiés:\n{}\n\n\
             Utilisez le format Markdown pour structurer votre résumé (titres, sous-titres, \
             puces). Le résumé doit être clair, concis et rigoureux.\n",
            clauses_json(clauses),
            clauses_json(risks)
        );

        let summary = self
            .chat
            .generate(&ChatRequest {
                system: SUMMARY_SYSTEM.to_string(),
                prompt,
                temperature: 0.5,
                max_tokens: 2000,
            })
            .await?;

        info!(chars = summary.len(), "summary generated");
        Ok(summary)
    }
}
