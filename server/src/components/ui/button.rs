use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonVariant {
    Primary,
    Secondary,
}

pub struct Button {
    pub label: String,
    pub variant: ButtonVariant,
    pub href: Option<String>,
    pub id: Option<String>,
}

impl Button {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            variant: ButtonVariant::Secondary,
            href: None,
            id: None,
        }
    }

    pub fn primary(label: &str) -> Self {
        Self {
            variant: ButtonVariant::Primary,
            ..Self::new(label)
        }
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    fn classes(&self) -> &'static str {
        match self.variant {
            ButtonVariant::Primary => {
                "inline-flex items-center justify-center px-5 py-2.5 rounded-md bg-emerald-500 \
                 hover:bg-emerald-400 text-neutral-950 font-medium transition-colors cursor-pointer"
            }
            ButtonVariant::Secondary => {
                "inline-flex items-center justify-center px-5 py-2.5 rounded-md bg-neutral-800 \
                 hover:bg-neutral-700 text-neutral-100 font-medium transition-colors cursor-pointer"
            }
        }
    }
}

impl Render for Button {
    fn render(&self) -> Markup {
        match &self.href {
            Some(href) => html! {
                a href=(href) id=[self.id.as_deref()] class=(self.classes()) { (self.label) }
            },
            None => html! {
                button type="button" id=[self.id.as_deref()] class=(self.classes()) { (self.label) }
            },
        }
    }
}
