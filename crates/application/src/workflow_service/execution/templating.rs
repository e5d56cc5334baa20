use super::*;

impl RunContext<'_> {
    /// Replaces `{{token}}` placeholders; unknown tokens are left as written.
    pub(super) fn interpolate(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            let (head, after_head) = rest.split_at(start);
            result.push_str(head);

            let Some(end_relative) = after_head.find("}}") else {
                result.push_str(after_head);
                rest = "";
                break;
            };

            let token = after_head[2..end_relative].trim();
            match self.token_value(token) {
                Some(value) => result.push_str(value_to_string(&value).as_str()),
                None => result.push_str(&after_head[..end_relative + 2]),
            }

            rest = &after_head[end_relative + 2..];
        }

        result.push_str(rest);
        result
    }

    fn token_value(&self, token: &str) -> Option<Value> {
        match token {
            "entity_id" => Some(Value::String(self.entity.entity_id.clone())),
            "entity_type" => Some(Value::String(self.entity.entity_type.as_str().to_owned())),
            "workflow.id" => Some(Value::String(self.workflow.id().to_string())),
            "workflow.name" => Some(Value::String(self.workflow.name().as_str().to_owned())),
            "run.id" => Some(Value::String(self.run.id.to_string())),
            "now" => Some(Value::String(Utc::now().to_rfc3339())),
            _ => token
                .strip_prefix("entity.")
                .and_then(|path| value_by_path(&self.run.trigger_payload, path))
                .cloned(),
        }
    }
}

fn value_by_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }

        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(content) => content.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
