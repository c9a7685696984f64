//! Answer Composer
//!
//! Fills the instruction template with the retrieved context and the
//! user's question, then streams the model's answer.

use tracing::{debug, info, warn};

use crate::context::{count_tokens, join_passages};
use crate::provider::{AnswerStream, CompletionProvider, ProviderError};

pub const DOCUMENT_TEXT_KEY: &str = "document_text";
pub const USER_QUESTION_KEY: &str = "user_question";

/// Context window of the default chat model
pub const MAX_PROMPT_TOKENS: u32 = 128_000;

/// Instruction template for pension and legal document analysis.
pub const ANSWER_TEMPLATE: &str = "\
Je bent expert in pensioenen en in het analyseren van juridische documenten. Je hebt een diepe kennis van de documenten die worden geselecteerd.
De geüploade documenten zijn de pensioenafspraken van een specifieke klant. Deze klant houden we anoniem, maar de afspraken zijn wel specifiek voor die klant.
Je geeft concreet en duidelijk antwoord.
Rond geen getallen af, deze geef je altijd precies.
Wees extra accuraat op nummers, getallen en specifieke details.
Als het je antwoord sterker maakt, gebruik dan ook een directe quote.
Bij een vraag over percentages in opbouw et cetera, bereken het precieze getal en maak geen afrondingen.
Zorg ervoor dat je accuraat bent omdat het om juridische documenten gaat, dus wees daar heel scherp op.
De gebruiker is een medewerker van de pensioenafdeling en zal dus vragen stellen die ofwel van de klant komen of intern.
Analyseer de vraag en geef duidelijke instructies als antwoord op de vraag, disclaimers en verdere informatie zijn niet nodig.
Je enige doel is de vraag beantwoorden en de gebruiker efficiënt met het systeem om te laten gaan.

Geef aan het eind van je antwoord een korte conclusie waarin je de vraag van de gebruiker zo direct mogelijk beantwoordt.

Gegeven de tekst uit de documenten: '{document_text}', en de vraag van de gebruiker: '{user_question}', hoe zou je deze vraag beantwoorden met inachtneming van de bovenstaande instructies?
";

/// Substitute `{key}` placeholders in one pass.
///
/// Values are inserted verbatim and never rescanned, so a value containing
/// `{user_question}` stays literal. Unknown placeholders are left as is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let matched = values.iter().find(|(key, _)| {
            tail.starts_with(key) && tail[key.len()..].starts_with('}')
        });
        match matched {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Build the full prompt from retrieved passages and the question.
pub fn compose_prompt<S: AsRef<str>>(passages: &[S], question: &str) -> String {
    let document_text = join_passages(passages);
    fill_template(
        ANSWER_TEMPLATE,
        &[(DOCUMENT_TEXT_KEY, &document_text), (USER_QUESTION_KEY, question)],
    )
}

/// A started answer and the size of the prompt behind it
#[derive(Debug)]
pub struct ComposedAnswer {
    pub prompt_tokens: u32,
    pub stream: AnswerStream,
}

/// Sends composed prompts to a streaming completion provider
#[derive(Debug, Clone)]
pub struct AnswerComposer<C> {
    provider: C,
}

impl<C: CompletionProvider> AnswerComposer<C> {
    pub fn new(provider: C) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &C {
        &self.provider
    }

    /// Compose the prompt and start streaming the answer.
    ///
    /// A prompt over `MAX_PROMPT_TOKENS` is still sent; the provider decides.
    pub async fn answer<S: AsRef<str>>(
        &self,
        passages: &[S],
        question: &str,
    ) -> Result<ComposedAnswer, ProviderError> {
        let prompt = compose_prompt(passages, question);
        let prompt_tokens = count_tokens(&prompt);
        debug!(passages = passages.len(), prompt_len = prompt.len(), "Composed prompt");

        if prompt_tokens > MAX_PROMPT_TOKENS {
            warn!(prompt_tokens, limit = MAX_PROMPT_TOKENS, "Prompt exceeds the model context window");
        } else {
            info!(prompt_tokens, "Prompt ready");
        }

        let stream = self.provider.stream_completion(&prompt).await?;
        info!("Answer stream opened");
        Ok(ComposedAnswer { prompt_tokens, stream })
    }
}
