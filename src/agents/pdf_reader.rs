use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agents::{DEFAULT_TEMPERATURE, SharedModel, ask_model, conversation, record};
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::documents::{DocumentLoader, FileLoader, load_all};
use crate::error::Result;
use crate::prompts::{render, system_prompt};
use crate::text::normalize_whitespace;

/// Answers questions from the text of given PDF files.
///
/// The documents must fit in the model's context window.
pub struct PdfReader {
    model: SharedModel,
    loader: Arc<dyn DocumentLoader>,
    template: String,
    additional_instructions: String,
    temperature: f32,
    chat_history: Vec<ChatMessage>,
}

impl PdfReader {
    pub fn new(model: SharedModel) -> Result<Self> {
        Ok(Self {
            model,
            loader: Arc::new(FileLoader),
            template: system_prompt("DocumentReader")?.to_string(),
            additional_instructions: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            chat_history: Vec::new(),
        })
    }

    pub fn with_loader(mut self, loader: impl DocumentLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// `{documents}` and `{additional_instructions}` are filled in.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.template = prompt.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = instructions.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    fn system_message(&self, documents: &[(PathBuf, String)]) -> ChatMessage {
        let mut block = String::new();
        for (path, text) in documents {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let text = normalize_whitespace(text);
            block.push_str(&format!("Contents of document {name} :\n{text}\n\n"));
        }
        let system = render(
            &self.template,
            &[
                ("documents", &block),
                ("additional_instructions", &self.additional_instructions),
            ],
        );
        ChatMessage::system(system.trim())
    }

    /// The `[system, user]` pair for `question`. Reads every file on the calling thread.
    pub fn prompt_for<P: AsRef<Path>>(
        &self,
        question: &str,
        files: &[P],
    ) -> Result<Vec<ChatMessage>> {
        let documents = files
            .iter()
            .map(|file| {
                let path = file.as_ref();
                Ok((path.to_path_buf(), self.loader.load(path)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(vec![self.system_message(&documents), ChatMessage::user(question)])
    }

    pub async fn ask<P: AsRef<Path>>(
        &mut self,
        question: &str,
        files: &[P],
        history: &[ChatMessage],
    ) -> Result<String> {
        let paths: Vec<PathBuf> = files.iter().map(|file| file.as_ref().to_path_buf()).collect();
        let texts = load_all(Arc::clone(&self.loader), paths.clone()).await?;
        let documents: Vec<(PathBuf, String)> = paths.into_iter().zip(texts).collect();

        let user = ChatMessage::user(question);
        let messages = conversation(self.system_message(&documents), history, user.clone());
        let reply = ask_model(
            self.model.as_ref(),
            &messages,
            self.temperature,
            ReplyFormat::Text,
        )
        .await?;
        record(&mut self.chat_history, user, &reply);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChatModel;
    use crate::chain::provider::Role;
    use crate::error::Error;
    use std::sync::Arc;

    fn fake_pdf(path: &Path) -> Result<String> {
        Ok(format!(" HELLLO from {}\n\n\n\n\n", path.display()))
    }

    #[tokio::test]
    async fn ask_reads_documents_into_the_system_prompt() {
        let model = Arc::new(MockChatModel::always("This is a response from the llm"));
        let mut reader = PdfReader::new(model.clone()).unwrap().with_loader(fake_pdf);

        let reply = reader
            .ask("What is the meaning of life?", &["docs/pdf1.pdf"], &[])
            .await
            .unwrap();

        assert_eq!(reply, "This is a response from the llm");
        let system = &model.calls()[0].messages[0];
        assert!(
            system
                .content
                .contains("Contents of document pdf1.pdf :\nHELLLO from docs/pdf1.pdf")
        );
        assert_eq!(reader.chat_history()[0].role, Role::User);
        assert_eq!(reader.chat_history()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn history_goes_after_the_document_prompt() {
        let model = Arc::new(MockChatModel::always("ok"));
        let mut reader = PdfReader::new(model.clone()).unwrap().with_loader(fake_pdf);

        reader
            .ask("Any phone numbers?", &["a.pdf", "b.pdf"], &[ChatMessage::user("Hello")])
            .await
            .unwrap();

        let sent = &model.calls()[0].messages;
        assert_eq!(sent.len(), 3);
        assert!(sent[0].content.contains("b.pdf"));
        assert_eq!(sent[1].content, "Hello");
        assert_eq!(reader.chat_history().len(), 2);
    }

    #[test]
    fn prompt_for_is_system_then_question() {
        let reader = PdfReader::new(Arc::new(MockChatModel::new()))
            .unwrap()
            .with_loader(fake_pdf);
        let prompts = reader.prompt_for("What is the meaning of life?", &["pdf1.pdf"]).unwrap();
        assert_eq!(prompts[0].role, Role::System);
        assert_eq!(prompts[1], ChatMessage::user("What is the meaning of life?"));
    }

    #[tokio::test]
    async fn unreadable_documents_fail_before_calling_the_model() {
        let model = Arc::new(MockChatModel::always("never"));
        let mut reader = PdfReader::new(model.clone())
            .unwrap()
            .with_loader(|_: &Path| -> Result<String> {
                Err(Error::InvalidArgument("no such file".to_string()))
            });

        assert!(reader.ask("?", &["missing.pdf"], &[]).await.is_err());
        assert_eq!(model.call_count(), 0);
    }
}
