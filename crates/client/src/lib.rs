pub mod assistant;
pub mod dashboard;
pub mod intake;

pub use assistant::{AssistantStatus, ChatReply, ChatRequest};
pub use dashboard::{
    ClientError, RecruitingClient, ShortlistReceipt, ShortlistRequest, SkillHeat, SkillsHeatmap,
};
pub use intake::{
    JdUploadReceipt, JobDescriptionSource, ResumeDetails, ResumeUpload, ResumeUploadReceipt,
};
