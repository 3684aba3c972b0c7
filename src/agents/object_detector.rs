use crate::agents::{SharedModel, ask_model};
use crate::chain::images::load_images;
use crate::chain::provider::{ChatMessage, ReplyFormat};
use crate::error::Result;
use crate::prompts::render_system_prompt;

const DETECTION_TEMPERATURE: f32 = 0.3;

/// What the caller wants found in the images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionTarget {
    /// Only these objects.
    Objects(Vec<String>),
    /// Free-text criterion, e.g. "anything that could be dangerous".
    Criteria(String),
}

/// Finds objects in images with a vision model, then filters them with a text model.
pub struct ObjectDetector {
    vision: SharedModel,
    text: SharedModel,
    vision_temperature: f32,
    text_temperature: f32,
}

impl ObjectDetector {
    /// `vision` must be multimodal. Both models may be the same handle.
    pub fn new(vision: SharedModel, text: SharedModel) -> Self {
        Self {
            vision,
            text,
            vision_temperature: DETECTION_TEMPERATURE,
            text_temperature: DETECTION_TEMPERATURE,
        }
    }

    pub fn with_temperatures(mut self, vision: f32, text: f32) -> Self {
        self.vision_temperature = vision;
        self.text_temperature = text;
        self
    }

    /// The `[system, user]` pair that filters `description` against `target`.
    pub fn filter_prompt(&self, description: &str, target: &DetectionTarget) -> Result<Vec<ChatMessage>> {
        let interest = match target {
            DetectionTarget::Objects(objects) => {
                format!("I'm INTERESTED in the following OBJECTS: {}", objects.join(", "))
            }
            DetectionTarget::Criteria(criteria) => {
                format!("I'm INTERESTED in the following: {criteria}")
            }
        };
        let user = format!(
            "Image Description: {description}\n\n{interest}\n Only return the objects that fit my interests"
        );
        Ok(vec![
            ChatMessage::system(render_system_prompt("ObjectFilterer", &[])?),
            ChatMessage::user(user),
        ])
    }

    /// Detects objects matching `target`. Images are file paths or base64 data.
    ///
    /// Returns the text model's JSON reply.
    pub async fn detect<S: AsRef<str>>(&self, images: &[S], target: &DetectionTarget) -> Result<String> {
        let images = load_images(images)?;
        let describe = vec![
            ChatMessage::system(render_system_prompt("ObjectDetector", &[])?),
            ChatMessage::user("Detect all objects in this image").with_images(images),
        ];
        let description = ask_model(
            self.vision.as_ref(),
            &describe,
            self.vision_temperature,
            ReplyFormat::Text,
        )
        .await?;

        let filter = self.filter_prompt(&description, target)?;
        ask_model(
            self.text.as_ref(),
            &filter,
            self.text_temperature,
            ReplyFormat::Json,
        )
        .await
    }
}
